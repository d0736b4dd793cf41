//! Message router and combat resolution
//!
//! Single entry point per inbound frame: parse, mutate the sender's record,
//! fan the result out. Every error condition here is handled locally — a
//! malformed or unknown frame is logged and dropped, and the connection
//! stays open. Nothing in this module can tear down the server or surface a
//! protocol error to another client.
//!
//! The `position` and `playerUpdate` channels are deliberately split: the
//! high-frequency movement path has no way to carry health, so combat state
//! can only change through the resolver or an explicit health-bearing
//! update.

use crate::registry::{ConnectionId, Outbound, Registry};
use log::{debug, error, info, warn};
use shared::{FireballEvent, Message, PlayerPatch, DEFAULT_DAMAGE};

/// Registers the connection, hands the new client its identity and the
/// current roster, and announces the join to everyone else. The roster
/// includes the new player's own record; clients filter it out.
pub fn handle_connect(registry: &mut Registry, conn: ConnectionId, outbound: Outbound) {
    let player = registry.register(conn, outbound);
    let init = Message::Init {
        id: player.id,
        players: registry.roster(),
    };
    registry.send_to(conn, &init);
    registry.to_others(conn, &Message::PlayerJoined(player));
}

/// Unregisters the connection and tells the remaining clients to release
/// the avatar. Safe to call more than once; only the first call broadcasts.
pub fn handle_disconnect(registry: &mut Registry, conn: ConnectionId) {
    if let Some(player) = registry.unregister(conn) {
        registry.to_all(&Message::PlayerLeft {
            id: player.id,
            name: player.name,
        });
    }
}

/// Parses and dispatches one inbound text frame from `conn`.
pub fn handle_message(registry: &mut Registry, conn: ConnectionId, raw: &str) {
    let message: Message = match serde_json::from_str(raw) {
        Ok(message) => message,
        Err(e) => {
            warn!("Dropping malformed frame from {:?}: {}", conn, e);
            return;
        }
    };

    // A connection that was never registered, or already unregistered, has
    // no record to mutate; its messages are dropped silently.
    if registry.player(conn).is_none() {
        debug!("Dropping frame from unregistered connection {:?}", conn);
        return;
    }

    match message {
        Message::Position {
            position,
            rotation,
            animation,
            name,
        } => {
            // Movement channel: structurally unable to touch health.
            let player = match registry.player_mut(conn) {
                Some(player) => player,
                None => return,
            };
            player.position = position;
            player.rotation = rotation;
            player.animation = animation;
            if let Some(ref name) = name {
                player.name = name.clone();
            }
            let relay = PlayerPatch {
                id: Some(player.id),
                position: Some(position),
                rotation: Some(rotation),
                animation: Some(animation),
                health: None,
                name,
            };
            registry.to_others(conn, &Message::PlayerUpdate(relay));
        }

        Message::PlayerUpdate(patch) => {
            let player = match registry.player_mut(conn) {
                Some(player) => player,
                None => return,
            };
            player.apply_patch(&patch);
            // The sender's record is the target regardless of what id the
            // payload claims; the relay carries the real one.
            let relay = PlayerPatch {
                id: Some(player.id),
                ..patch
            };
            registry.to_others(conn, &Message::PlayerUpdate(relay));
        }

        Message::UpdateName { id, name } => {
            let player = match registry.player_mut(conn) {
                Some(player) => player,
                None => return,
            };
            if player.id != id {
                warn!(
                    "Rename for id {} from connection owning id {}, dropped",
                    id, player.id
                );
                return;
            }
            player.name = name.clone();
            info!("Player {} renamed to {}", id, name);
            registry.to_all(&Message::NameUpdate { id, name });
        }

        // Synonyms with identical handling.
        Message::DirectDamage {
            target_id, damage, ..
        }
        | Message::DamagePlayer {
            target_id, damage, ..
        } => {
            apply_damage(registry, conn, target_id, damage);
        }

        Message::Fireball(event) => {
            // Ephemeral relay: nothing persists, the sender id is stamped in
            // and every other field passes through untouched.
            let player_id = registry.player(conn).map(|p| p.id);
            registry.to_others(
                conn,
                &Message::Fireball(FireballEvent { player_id, ..event }),
            );
        }

        Message::Init { .. }
        | Message::PlayerJoined(_)
        | Message::PlayerLeft { .. }
        | Message::NameUpdate { .. }
        | Message::PlayerKill { .. } => {
            warn!("Dropping server-only message type from {:?}", conn);
        }
    }
}

/// Applies a damage event from the connection owning `conn` to the player
/// with id `target_id`.
///
/// Resulting health is clamped to `[0, max_health]`. A defeat fires exactly
/// once per downward crossing: further damage to a target already at zero
/// health changes no counters until a later update revives it. Respawn is
/// client-initiated via a health-bearing `playerUpdate` and applied without
/// validation.
fn apply_damage(
    registry: &mut Registry,
    attacker_conn: ConnectionId,
    target_id: u32,
    damage: Option<i32>,
) {
    let attacker_id = match registry.player(attacker_conn) {
        Some(player) => player.id,
        None => return,
    };

    let amount = damage.unwrap_or(DEFAULT_DAMAGE);
    if amount < 0 {
        warn!(
            "Negative damage {} from player {} ignored",
            amount, attacker_id
        );
        return;
    }

    let (snapshot, victim_deaths, defeated) = match registry.player_by_id_mut(target_id) {
        Some(target) => {
            let was_alive = target.is_alive();
            // Saturating: a client can push its own health to i32::MIN through
            // the unvalidated update channel, and plain subtraction would
            // overflow there.
            target.health = target.health.saturating_sub(amount).clamp(0, target.max_health);
            let defeated = was_alive && !target.is_alive();
            if defeated {
                target.deaths += 1;
            }
            (PlayerPatch::from_state(target), target.deaths, defeated)
        }
        None => {
            error!(
                "Damage from player {} for unknown target {}",
                attacker_id, target_id
            );
            return;
        }
    };

    let killer_kills = if defeated {
        match registry.player_mut(attacker_conn) {
            Some(attacker) => {
                attacker.kills += 1;
                attacker.kills
            }
            None => 0,
        }
    } else {
        0
    };

    // Everyone sees the resulting record, the attacker included.
    registry.to_all(&Message::PlayerUpdate(snapshot));

    if defeated {
        info!("Player {} defeated player {}", attacker_id, target_id);
        registry.to_all(&Message::PlayerKill {
            killer_id: attacker_id,
            killer_kills,
            victim_id: target_id,
            victim_deaths,
        });
    }
}
