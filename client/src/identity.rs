//! Identity recovery
//!
//! The local id is learned from the `init` message, but handshake races and
//! reconnects reusing client state can leave the belief pointing at an id
//! with no tracked record. When that happens and exactly one tracked record
//! remains, that record can only be the local player, so its id is adopted.
//! With zero or several candidates the situation is ambiguous and nothing
//! is guessed; a later message usually disambiguates it.
//!
//! This is the single place the correction lives; the session runner calls
//! it from one periodic timer.

use crate::session::SessionState;
use log::{debug, info};

/// Attempts to repair a desynchronized local id. Returns true if the belief
/// was corrected.
pub fn recover(session: &mut SessionState) -> bool {
    let Some(local_id) = session.local_id else {
        // No belief yet; init has not arrived. Nothing to repair.
        return false;
    };

    // A tracked record for the believed id means the registry views agree.
    if session.tracked.contains_key(&local_id) {
        return false;
    }

    // The belief matches no record. With a single tracked record left, that
    // record must be us; it stays tracked under the adopted id.
    let mut candidates = session.tracked.keys();
    match (candidates.next().copied(), candidates.next()) {
        (Some(candidate), None) => {
            info!(
                "Corrected local id {} -> {} (single remaining candidate)",
                local_id, candidate
            );
            session.local_id = Some(candidate);
            true
        }
        _ => {
            debug!(
                "Local id {} untracked, {} candidates; leaving belief alone",
                local_id,
                session.tracked.len()
            );
            false
        }
    }
}
