//! WebSocket accept loop and per-connection tasks
//!
//! One task per connection reads frames and runs each one to completion
//! under the registry write lock, so a message is fully parsed, applied and
//! fanned out before the next frame from the same connection is touched.
//! Outbound traffic goes through an unbounded per-connection queue drained
//! by a dedicated writer task; broadcasting never awaits an individual
//! client's socket.

use crate::registry::{ConnectionId, Registry};
use crate::router;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

pub type SharedRegistry = Arc<RwLock<Registry>>;

/// Accepts connections forever. The listener is bound by the caller so that
/// a bind failure stays the process's only fatal path.
pub async fn serve(listener: TcpListener, registry: SharedRegistry) {
    let mut next_conn_id: u64 = 0;

    while let Ok((stream, addr)) = listener.accept().await {
        next_conn_id += 1;
        let conn = ConnectionId(next_conn_id);
        let registry = Arc::clone(&registry);

        tokio::spawn(async move {
            debug!("Accepted connection {:?} from {}", conn, addr);
            handle_connection(stream, conn, registry).await;
        });
    }
}

async fn handle_connection(stream: TcpStream, conn: ConnectionId, registry: SharedRegistry) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            warn!("WebSocket handshake failed for {:?}: {}", conn, e);
            return;
        }
    };

    let (mut sink, mut stream) = ws_stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

    // Writer task: drains this connection's queue. A stalled socket only
    // grows its own queue and never blocks the fanout loop.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if sink.send(frame).await.is_err() {
                break;
            }
        }
    });

    {
        let mut registry = registry.write().await;
        router::handle_connect(&mut registry, conn, outbound_tx);
    }

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                let mut registry = registry.write().await;
                router::handle_message(&mut registry, conn, &text);
            }
            Ok(WsMessage::Close(_)) => break,
            // Pings are answered by the protocol layer; binary frames carry
            // no protocol messages.
            Ok(_) => {}
            Err(e) => {
                info!("Connection {:?} errored: {}", conn, e);
                break;
            }
        }
    }

    // Definitive disconnect: unregister and announce, no retry.
    {
        let mut registry = registry.write().await;
        router::handle_disconnect(&mut registry, conn);
    }
    writer.abort();
}
