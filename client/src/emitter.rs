//! Outbound intent emitter
//!
//! Snapshots the local avatar into a movement frame on a fixed timer. The
//! movement frame is the high-frequency channel and carries pose only;
//! health never travels on it, so a compromised or buggy sender cannot
//! smuggle hit-point writes through the hot path.

use crate::session::LocalAvatar;
use shared::Message;

/// Default movement send rate in frames per second.
pub const DEFAULT_SEND_RATE: u32 = 20;

/// Builds the movement frame for the current avatar pose. The name rides
/// along on every frame so lazily-created records on other clients converge
/// on it without a dedicated exchange.
pub fn intent_message(avatar: &LocalAvatar) -> Message {
    Message::Position {
        position: avatar.position,
        rotation: avatar.rotation,
        animation: avatar.animation,
        name: Some(avatar.name.clone()),
    }
}
