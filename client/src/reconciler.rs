//! Remote player reconciliation
//!
//! Takes the inbound stream of out-of-order, lossy-feeling server messages
//! and folds it into the tracked player records, emitting a normalized feed
//! of events for the presentation layer. Each id moves through a two-state
//! machine: unknown until first sight, then tracked until its `playerLeft`
//! arrives.
//!
//! A record may be created lazily by any update referencing an id we have
//! never seen. Creation messages can be lost or arrive after the updates
//! they announce; dropping those updates would leave permanent ghosts, so
//! absent fields default instead.

use crate::session::{SessionState, TrackedPlayer};
use log::{debug, info, warn};
use shared::{FireballEvent, Message, PlayerPatch};

/// Normalized player-state feed consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A remote avatar should be created.
    Joined { id: u32 },
    /// A remote avatar and its resources should be released.
    Left { id: u32, name: String },
    /// A tracked record changed; read the new state off the session.
    Updated { id: u32 },
    NameChanged { id: u32, name: String },
    /// Scoreboard bookkeeping for a defeat.
    Defeat { killer_id: u32, victim_id: u32 },
    /// A projectile to spawn locally.
    Fireball(FireballEvent),
}

/// Applies one inbound message to the session, returning the feed events it
/// produced. Self-updates are discarded before reconciliation: the local
/// avatar is driven by local input, never by the server echo.
pub fn apply(session: &mut SessionState, message: Message) -> Vec<FeedEvent> {
    match message {
        Message::Init { id, players } => {
            info!("Session initialized, local id {}", id);
            session.local_id = Some(id);
            let mut events = Vec::new();
            for player in players {
                let player_id = player.id;
                // Our own roster entry is tracked too (identity recovery
                // leans on it) but spawns no remote avatar.
                session
                    .tracked
                    .insert(player_id, TrackedPlayer::new(player));
                if player_id != id {
                    events.push(FeedEvent::Joined { id: player_id });
                }
            }
            events
        }

        Message::PlayerJoined(player) => {
            if session.is_self(player.id) {
                return Vec::new();
            }
            let id = player.id;
            info!("Player {} joined ({})", id, player.name);
            session.tracked.insert(id, TrackedPlayer::new(player));
            vec![FeedEvent::Joined { id }]
        }

        Message::PlayerLeft { id, name } => {
            if session.is_self(id) {
                return Vec::new();
            }
            if session.tracked.remove(&id).is_some() {
                info!("Player {} left ({})", id, name);
                vec![FeedEvent::Left { id, name }]
            } else {
                debug!("playerLeft for untracked id {}", id);
                Vec::new()
            }
        }

        Message::PlayerUpdate(patch) => {
            let Some(id) = patch.id else {
                warn!("playerUpdate without id, dropped");
                return Vec::new();
            };
            if session.is_self(id) {
                return Vec::new();
            }
            apply_patch(session, id, &patch)
        }

        Message::NameUpdate { id, name } => {
            if session.is_self(id) {
                return Vec::new();
            }
            let patch = PlayerPatch {
                id: Some(id),
                name: Some(name.clone()),
                ..Default::default()
            };
            let mut events = apply_patch(session, id, &patch);
            events.push(FeedEvent::NameChanged { id, name });
            events
        }

        Message::PlayerKill {
            killer_id,
            killer_kills,
            victim_id,
            victim_deaths,
        } => {
            // Scoreboard counters are server-authoritative for everyone,
            // the local record included.
            if let Some(killer) = session.tracked.get_mut(&killer_id) {
                killer.state.kills = killer_kills;
            }
            if let Some(victim) = session.tracked.get_mut(&victim_id) {
                victim.state.deaths = victim_deaths;
            }
            vec![FeedEvent::Defeat {
                killer_id,
                victim_id,
            }]
        }

        Message::Fireball(event) => {
            if event.player_id.is_some_and(|id| session.is_self(id)) {
                return Vec::new();
            }
            vec![FeedEvent::Fireball(event)]
        }

        // Client-to-server message types have no business arriving inbound.
        Message::Position { .. }
        | Message::UpdateName { .. }
        | Message::DirectDamage { .. }
        | Message::DamagePlayer { .. } => {
            warn!("Dropping client-bound message type from server");
            Vec::new()
        }
    }
}

/// Merges a patch into the tracked record for `id`, creating the record
/// lazily if this is the first sight of that id.
fn apply_patch(session: &mut SessionState, id: u32, patch: &PlayerPatch) -> Vec<FeedEvent> {
    if let Some(player) = session.tracked.get_mut(&id) {
        player.apply_patch(patch);
        vec![FeedEvent::Updated { id }]
    } else {
        debug!("Lazily tracking player {} from partial update", id);
        session
            .tracked
            .insert(id, TrackedPlayer::from_patch(id, patch));
        vec![FeedEvent::Joined { id }, FeedEvent::Updated { id }]
    }
}
