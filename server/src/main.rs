use clap::Parser;
use log::info;
use server::network::{self, SharedRegistry};
use server::registry::{ColorMode, Registry};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the listener to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Listen port; the PORT environment variable takes precedence
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Assign player colors randomly instead of cycling the palette
    #[arg(long)]
    randomize_colors: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(args.port);

    let color_mode = if args.randomize_colors {
        ColorMode::Randomized
    } else {
        ColorMode::Palette
    };

    // Bind failure is the only fatal error path in the process.
    let address = format!("{}:{}", args.host, port);
    let listener = TcpListener::bind(&address).await?;
    info!("Server listening on {}", address);

    let registry: SharedRegistry = Arc::new(RwLock::new(Registry::new(color_mode)));

    tokio::select! {
        _ = network::serve(listener, registry) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
