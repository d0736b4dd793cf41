//! Connection registry and broadcast fanout for the session server
//!
//! Maps each live transport connection to its player record and owns
//! identity assignment. The registry is created by the accept loop and
//! passed by handle into the message router; it is never a module-level
//! singleton. Registry operations never fail: a connection that is not
//! registered simply yields `None` on lookup and its messages are dropped
//! upstream.

use log::{debug, error, info};
use rand::Rng;
use shared::{Message, PlayerState};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// Display colors cycled through as players connect.
pub const PLAYER_COLORS: [&str; 8] = [
    "blue", "red", "green", "purple", "orange", "cyan", "magenta", "yellow",
];

/// How the registry picks a player's display color at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Deterministic palette index derived from the player id.
    Palette,
    /// Random palette entry per connection.
    Randomized,
}

/// Identifies one transport connection for its lifetime. Distinct from the
/// player id: the primary map is keyed by transport handle, and resolving a
/// player id is a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Queue feeding a connection's writer task. Unbounded so a slow client
/// buffers in its own queue instead of stalling the broadcast loop.
pub type Outbound = mpsc::UnboundedSender<WsMessage>;

struct Connection {
    player: PlayerState,
    outbound: Outbound,
}

/// Server-side player registry plus the fanout primitives.
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    next_player_id: u32,
    color_mode: ColorMode,
}

impl Registry {
    pub fn new(color_mode: ColorMode) -> Self {
        Self {
            connections: HashMap::new(),
            next_player_id: 1,
            color_mode,
        }
    }

    /// Allocates the next player id and creates a default record for the
    /// connection. Ids are monotonically increasing from 1 and never reused
    /// while the process runs.
    pub fn register(&mut self, conn: ConnectionId, outbound: Outbound) -> PlayerState {
        let id = self.next_player_id;
        self.next_player_id += 1;

        let color = match self.color_mode {
            ColorMode::Palette => PLAYER_COLORS[(id as usize - 1) % PLAYER_COLORS.len()],
            ColorMode::Randomized => {
                PLAYER_COLORS[rand::thread_rng().gen_range(0..PLAYER_COLORS.len())]
            }
        };

        let player = PlayerState::new(id, color.to_string());
        info!("Player {} registered ({})", id, player.name);
        self.connections.insert(
            conn,
            Connection {
                player: player.clone(),
                outbound,
            },
        );
        player
    }

    /// Removes and returns the record if present. A second call for the same
    /// connection is a no-op returning `None`.
    pub fn unregister(&mut self, conn: ConnectionId) -> Option<PlayerState> {
        let removed = self.connections.remove(&conn).map(|c| c.player);
        if let Some(ref player) = removed {
            info!("Player {} unregistered ({})", player.id, player.name);
        }
        removed
    }

    pub fn player(&self, conn: ConnectionId) -> Option<&PlayerState> {
        self.connections.get(&conn).map(|c| &c.player)
    }

    pub fn player_mut(&mut self, conn: ConnectionId) -> Option<&mut PlayerState> {
        self.connections.get_mut(&conn).map(|c| &mut c.player)
    }

    /// Resolves a player id to its record. The primary map is keyed by
    /// connection, so this is a scan; rosters are small.
    pub fn player_by_id(&self, id: u32) -> Option<&PlayerState> {
        self.connections
            .values()
            .map(|c| &c.player)
            .find(|p| p.id == id)
    }

    pub fn player_by_id_mut(&mut self, id: u32) -> Option<&mut PlayerState> {
        self.connections
            .values_mut()
            .map(|c| &mut c.player)
            .find(|p| p.id == id)
    }

    /// Snapshot of every live record, used for the handshake roster.
    pub fn roster(&self) -> Vec<PlayerState> {
        self.connections.values().map(|c| c.player.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Sends a message to a single connection. A closed queue means the
    /// connection is tearing down; the frame is dropped silently.
    pub fn send_to(&self, conn: ConnectionId, message: &Message) {
        let Some(text) = encode(message) else { return };
        if let Some(connection) = self.connections.get(&conn) {
            if connection.outbound.send(WsMessage::Text(text)).is_err() {
                debug!("Dropped frame for closing connection {:?}", conn);
            }
        }
    }

    /// Fire-and-forget fanout to every connection except the sender.
    /// Serializes once; a connection mid-teardown is skipped and never fails
    /// delivery to the other recipients.
    pub fn to_others(&self, sender: ConnectionId, message: &Message) {
        let Some(text) = encode(message) else { return };
        for (conn, connection) in &self.connections {
            if *conn == sender {
                continue;
            }
            if connection
                .outbound
                .send(WsMessage::Text(text.clone()))
                .is_err()
            {
                debug!("Dropped frame for closing connection {:?}", conn);
            }
        }
    }

    /// Fire-and-forget fanout to every connection, sender included.
    pub fn to_all(&self, message: &Message) {
        let Some(text) = encode(message) else { return };
        for (conn, connection) in &self.connections {
            if connection
                .outbound
                .send(WsMessage::Text(text.clone()))
                .is_err()
            {
                debug!("Dropped frame for closing connection {:?}", conn);
            }
        }
    }
}

fn encode(message: &Message) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(e) => {
            error!("Failed to serialize outbound message: {}", e);
            None
        }
    }
}
