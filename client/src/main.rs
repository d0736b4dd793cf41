use clap::Parser;
use client::emitter::DEFAULT_SEND_RATE;
use client::network::Session;
use log::info;

/// Headless session client. Connects, emits movement frames for a
/// stationary avatar and logs the event feed; useful for soaking the
/// server and for watching a session from the outside.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the relay server
    #[arg(short, long, default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Display name reported on movement frames
    #[arg(short, long, default_value = "Player")]
    name: String,

    /// Movement frames per second
    #[arg(long, default_value_t = DEFAULT_SEND_RATE)]
    send_rate: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut session = Session::connect(&args.server, args.name, args.send_rate).await?;

    tokio::select! {
        _ = session.run() => {
            info!("Session ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, disconnecting");
        }
    }

    Ok(())
}
