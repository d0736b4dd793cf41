//! Client transport and session runner
//!
//! Owns the WebSocket connection and drives the session from one `select!`
//! loop: inbound frames feed the reconciler, a send timer snapshots the
//! local avatar onto the wire, a blend timer advances remote pose
//! smoothing and a slower timer runs identity recovery. When the transport
//! closes the session state is dropped; a reconnect starts from scratch.

use crate::emitter;
use crate::identity;
use crate::reconciler::{self, FeedEvent};
use crate::session::SessionState;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::Message;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Remote pose smoothing tick period.
const BLEND_INTERVAL: Duration = Duration::from_millis(16);
/// Identity recovery runs rarely; it is a repair path, not a hot path.
const RECOVERY_INTERVAL: Duration = Duration::from_secs(2);

/// A live connection to the relay server plus the session it drives.
pub struct Session {
    pub state: SessionState,
    writer: WsWriter,
    reader: WsReader,
    send_rate: u32,
}

impl Session {
    /// Connects to the server and prepares a fresh session. The local id is
    /// unknown until the server's `init` frame arrives inside [`run`].
    ///
    /// [`run`]: Session::run
    pub async fn connect(
        url: &str,
        name: String,
        send_rate: u32,
    ) -> Result<Self, tokio_tungstenite::tungstenite::Error> {
        let (socket, _) = connect_async(url).await?;
        info!("Connected to {}", url);
        let (writer, reader) = socket.split();
        Ok(Self {
            state: SessionState::new(name),
            writer,
            reader,
            send_rate,
        })
    }

    /// Sends one message to the server immediately, outside the movement
    /// timer. Used for rename and combat intents.
    pub async fn send(
        &mut self,
        message: &Message,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        let encoded = serde_json::to_string(message)
            .map_err(|e| tokio_tungstenite::tungstenite::Error::Io(e.into()))?;
        self.writer.send(WsMessage::Text(encoded)).await
    }

    /// Drives the session until the server closes the connection. Inbound
    /// feed events are logged; a rendering frontend would consume them from
    /// the same loop instead.
    pub async fn run(&mut self) {
        let mut send_timer = tokio::time::interval(send_period(self.send_rate));
        let mut blend_timer = tokio::time::interval(BLEND_INTERVAL);
        let mut recovery_timer = tokio::time::interval(RECOVERY_INTERVAL);

        loop {
            tokio::select! {
                frame = self.reader.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(raw))) => {
                            self.handle_frame(&raw);
                        }
                        Some(Ok(WsMessage::Close(_))) | None => {
                            info!("Server closed the connection");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("Transport error: {}", e);
                            break;
                        }
                    }
                }
                _ = send_timer.tick() => {
                    let intent = emitter::intent_message(&self.state.local);
                    if let Ok(encoded) = serde_json::to_string(&intent) {
                        if self.writer.send(WsMessage::Text(encoded)).await.is_err() {
                            warn!("Send failed, shutting down session");
                            break;
                        }
                    }
                }
                _ = blend_timer.tick() => {
                    self.state.advance(BLEND_INTERVAL.as_secs_f32());
                }
                _ = recovery_timer.tick() => {
                    identity::recover(&mut self.state);
                }
            }
        }

        self.state.clear();
    }

    fn handle_frame(&mut self, raw: &str) {
        let message: Message = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed frame: {}", e);
                return;
            }
        };
        for event in reconciler::apply(&mut self.state, message) {
            log_event(&self.state, &event);
        }
    }
}

/// Frame period for a movement send rate. Floored at 1ms: tokio intervals
/// reject a zero period, and rates above 1000/s would otherwise produce one.
fn send_period(rate: u32) -> Duration {
    Duration::from_millis((1000 / u64::from(rate.max(1))).max(1))
}

fn log_event(state: &SessionState, event: &FeedEvent) {
    match event {
        FeedEvent::Joined { id } => {
            let name = state
                .tracked
                .get(id)
                .map(|p| p.state.name.as_str())
                .unwrap_or("?");
            info!("Player {} joined ({})", id, name);
        }
        FeedEvent::Left { id, name } => info!("Player {} left ({})", id, name),
        FeedEvent::Updated { id } => debug!("Player {} updated", id),
        FeedEvent::NameChanged { id, name } => info!("Player {} is now {}", id, name),
        FeedEvent::Defeat {
            killer_id,
            victim_id,
        } => info!("Player {} defeated player {}", killer_id, victim_id),
        FeedEvent::Fireball(event) => {
            debug!(
                "Fireball from {:?} at ({:.1}, {:.1}, {:.1})",
                event.player_id, event.position.x, event.position.y, event.position.z
            );
        }
    }
}
