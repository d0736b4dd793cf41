//! Integration tests for the session relay
//!
//! These tests run the real WebSocket server on an ephemeral port and talk
//! to it with real client sockets, validating the handshake, relay fanout,
//! combat accounting and disconnect cleanup end to end.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use server::network::{self, SharedRegistry};
use server::registry::{ColorMode, Registry};
use shared::{Animation, FireballEvent, Message, Vec3};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Boots a server on an ephemeral port and returns its WebSocket URL.
async fn start_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().unwrap();
    let registry: SharedRegistry = Arc::new(RwLock::new(Registry::new(ColorMode::Palette)));
    tokio::spawn(network::serve(listener, registry));
    format!("ws://{}", addr)
}

async fn recv_raw(socket: &mut Socket) -> String {
    loop {
        let frame = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Connection closed")
            .expect("Transport error");
        if let WsMessage::Text(text) = frame {
            return text;
        }
    }
}

async fn recv(socket: &mut Socket) -> Message {
    let raw = recv_raw(socket).await;
    serde_json::from_str(&raw).expect("Server sent an undecodable frame")
}

async fn send(socket: &mut Socket, message: &Message) {
    let encoded = serde_json::to_string(message).unwrap();
    socket.send(WsMessage::Text(encoded)).await.unwrap();
}

/// Connects a client and consumes its `init` frame, returning the socket
/// and the assigned id.
async fn join(url: &str) -> (Socket, u32) {
    let (mut socket, _) = connect_async(url).await.expect("Failed to connect");
    match recv(&mut socket).await {
        Message::Init { id, .. } => (socket, id),
        other => panic!("Expected init, got {:?}", other),
    }
}

/// HANDSHAKE AND ROSTER TESTS
mod handshake_tests {
    use super::*;

    #[tokio::test]
    async fn init_assigns_monotonic_ids_and_full_roster() {
        let url = start_server().await;

        let (mut first, _) = connect_async(&url).await.unwrap();
        match recv(&mut first).await {
            Message::Init { id, players } => {
                assert_eq!(id, 1);
                // The roster includes the new player's own record
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].id, 1);
                assert_eq!(players[0].color, "blue");
                assert_eq!(players[0].health, 100);
                assert_eq!(players[0].name, "Player 1");
            }
            other => panic!("Expected init, got {:?}", other),
        }

        let (mut second, _) = connect_async(&url).await.unwrap();
        match recv(&mut second).await {
            Message::Init { id, players } => {
                assert_eq!(id, 2);
                let mut ids: Vec<u32> = players.iter().map(|p| p.id).collect();
                ids.sort();
                assert_eq!(ids, vec![1, 2]);
            }
            other => panic!("Expected init, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn existing_players_see_player_joined() {
        let url = start_server().await;
        let (mut first, _) = join(&url).await;
        let (_second, second_id) = join(&url).await;

        match recv(&mut first).await {
            Message::PlayerJoined(player) => {
                assert_eq!(player.id, second_id);
                assert_eq!(player.color, "red");
                assert_eq!(player.health, 100);
            }
            other => panic!("Expected playerJoined, got {:?}", other),
        }
    }
}

/// MOVEMENT RELAY TESTS
mod relay_tests {
    use super::*;

    #[tokio::test]
    async fn position_relays_as_player_update_without_health() {
        let url = start_server().await;
        let (mut sender, sender_id) = join(&url).await;
        let (mut receiver, _) = join(&url).await;
        // Consume the join announcement on the first socket
        recv(&mut sender).await;

        send(
            &mut sender,
            &Message::Position {
                position: Vec3::new(3.0, 0.0, -1.5),
                rotation: 0.75,
                animation: Animation::Run,
                name: Some("Ada".to_string()),
            },
        )
        .await;

        let raw = recv_raw(&mut receiver).await;
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "playerUpdate");
        // The movement relay never carries hit points
        assert!(value["data"].get("health").is_none());

        match serde_json::from_str(&raw).unwrap() {
            Message::PlayerUpdate(patch) => {
                assert_eq!(patch.id, Some(sender_id));
                assert_eq!(patch.position, Some(Vec3::new(3.0, 0.0, -1.5)));
                assert_eq!(patch.rotation, Some(0.75));
                assert_eq!(patch.animation, Some(Animation::Run));
                assert_eq!(patch.name.as_deref(), Some("Ada"));
            }
            other => panic!("Expected playerUpdate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn smuggled_health_on_movement_frame_is_ignored() {
        let url = start_server().await;
        let (mut victim, victim_id) = join(&url).await;
        let (mut attacker, _) = join(&url).await;
        recv(&mut victim).await; // playerJoined

        // A hand-crafted movement frame with a health field bolted on
        let raw = r#"{"type":"position","data":{"position":{"x":1.0,"y":0.0,"z":0.0},"rotation":0.0,"animation":"idle","health":999}}"#;
        victim
            .send(WsMessage::Text(raw.to_string()))
            .await
            .unwrap();
        recv(&mut attacker).await; // the relayed playerUpdate

        // Damage now proves health was still at the default 100
        send(
            &mut attacker,
            &Message::DirectDamage {
                target_id: victim_id,
                damage: None,
                new_health: None,
            },
        )
        .await;

        match recv(&mut attacker).await {
            Message::PlayerUpdate(patch) => {
                assert_eq!(patch.id, Some(victim_id));
                assert_eq!(patch.health, Some(90));
            }
            other => panic!("Expected playerUpdate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn fireball_is_stamped_and_excludes_sender() {
        let url = start_server().await;
        let (mut caster, caster_id) = join(&url).await;
        let (mut observer, _) = join(&url).await;
        recv(&mut caster).await; // playerJoined

        send(
            &mut caster,
            &Message::Fireball(FireballEvent {
                player_id: None,
                position: Vec3::new(0.0, 1.2, 0.0),
                direction: Vec3::new(0.0, 0.0, 1.0),
                target_point: Some(Vec3::new(0.0, 1.2, 10.0)),
                speed: Some(25.0),
                damage: Some(15),
            }),
        )
        .await;

        match recv(&mut observer).await {
            Message::Fireball(event) => {
                assert_eq!(event.player_id, Some(caster_id));
                assert_eq!(event.position, Vec3::new(0.0, 1.2, 0.0));
                assert_eq!(event.direction, Vec3::new(0.0, 0.0, 1.0));
                assert_eq!(event.target_point, Some(Vec3::new(0.0, 1.2, 10.0)));
                assert_eq!(event.speed, Some(25.0));
                assert_eq!(event.damage, Some(15));
            }
            other => panic!("Expected fireball, got {:?}", other),
        }

        // Sentinel: a rename reaches everyone, the caster included. If the
        // caster's next frame is the rename, the fireball never echoed back.
        send(
            &mut caster,
            &Message::UpdateName {
                id: caster_id,
                name: "Ada".to_string(),
            },
        )
        .await;
        match recv(&mut caster).await {
            Message::NameUpdate { id, name } => {
                assert_eq!(id, caster_id);
                assert_eq!(name, "Ada");
            }
            other => panic!("Fireball echoed to its sender: {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_and_unknown_frames_are_dropped() {
        let url = start_server().await;
        let (mut sender, sender_id) = join(&url).await;
        let (mut receiver, _) = join(&url).await;
        recv(&mut sender).await; // playerJoined

        sender
            .send(WsMessage::Text("{not json".to_string()))
            .await
            .unwrap();
        sender
            .send(WsMessage::Text(
                "{\"type\":\"teleport\",\"data\":{}}".to_string(),
            ))
            .await
            .unwrap();

        // The connection survives and keeps relaying
        send(
            &mut sender,
            &Message::UpdateName {
                id: sender_id,
                name: "still-here".to_string(),
            },
        )
        .await;
        match recv(&mut receiver).await {
            Message::NameUpdate { id, name } => {
                assert_eq!(id, sender_id);
                assert_eq!(name, "still-here");
            }
            other => panic!("Expected nameUpdate, got {:?}", other),
        }
    }
}

/// COMBAT ACCOUNTING TESTS
mod combat_tests {
    use super::*;

    async fn hit(attacker: &mut Socket, target_id: u32) {
        send(
            attacker,
            &Message::DirectDamage {
                target_id,
                damage: None,
                new_health: None,
            },
        )
        .await;
    }

    #[tokio::test]
    async fn default_damage_drains_health_to_zero_and_reports_one_kill() {
        let url = start_server().await;
        let (mut victim, victim_id) = join(&url).await;
        let (mut attacker, attacker_id) = join(&url).await;
        recv(&mut victim).await; // playerJoined

        // 100 health at 10 per hit: the tenth hit is the defeat
        for expected in (0..=90).rev().step_by(10) {
            hit(&mut attacker, victim_id).await;
            match recv(&mut attacker).await {
                Message::PlayerUpdate(patch) => {
                    assert_eq!(patch.id, Some(victim_id));
                    assert_eq!(patch.health, Some(expected));
                }
                other => panic!("Expected playerUpdate, got {:?}", other),
            }
        }

        match recv(&mut attacker).await {
            Message::PlayerKill {
                killer_id,
                killer_kills,
                victim_id: reported_victim,
                victim_deaths,
            } => {
                assert_eq!(killer_id, attacker_id);
                assert_eq!(killer_kills, 1);
                assert_eq!(reported_victim, victim_id);
                assert_eq!(victim_deaths, 1);
            }
            other => panic!("Expected playerKill, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn hitting_a_defeated_player_never_double_counts() {
        let url = start_server().await;
        let (mut victim, victim_id) = join(&url).await;
        let (mut attacker, attacker_id) = join(&url).await;
        recv(&mut victim).await;

        for _ in 0..10 {
            hit(&mut attacker, victim_id).await;
            recv(&mut attacker).await; // playerUpdate
        }
        recv(&mut attacker).await; // playerKill

        // An eleventh hit on a player already at zero
        hit(&mut attacker, victim_id).await;
        match recv(&mut attacker).await {
            Message::PlayerUpdate(patch) => {
                assert_eq!(patch.health, Some(0));
            }
            other => panic!("Expected playerUpdate, got {:?}", other),
        }

        // Sentinel: if no second playerKill was queued, the rename is next
        send(
            &mut attacker,
            &Message::UpdateName {
                id: attacker_id,
                name: "done".to_string(),
            },
        )
        .await;
        match recv(&mut attacker).await {
            Message::NameUpdate { name, .. } => assert_eq!(name, "done"),
            other => panic!("Defeat was double counted: {:?}", other),
        }
    }

    #[tokio::test]
    async fn respawn_rearms_defeat_accounting() {
        let url = start_server().await;
        let (mut victim, victim_id) = join(&url).await;
        let (mut attacker, _) = join(&url).await;
        recv(&mut victim).await;

        for _ in 0..10 {
            hit(&mut attacker, victim_id).await;
            recv(&mut attacker).await;
        }
        recv(&mut attacker).await; // first playerKill

        // Client-authoritative respawn through the explicit update channel
        send(
            &mut victim,
            &Message::PlayerUpdate(shared::PlayerPatch {
                health: Some(100),
                position: Some(Vec3::ZERO),
                ..Default::default()
            }),
        )
        .await;
        match recv(&mut attacker).await {
            Message::PlayerUpdate(patch) => assert_eq!(patch.health, Some(100)),
            other => panic!("Expected respawn update, got {:?}", other),
        }

        // A second full drain is a second defeat
        for _ in 0..10 {
            hit(&mut attacker, victim_id).await;
            recv(&mut attacker).await;
        }
        match recv(&mut attacker).await {
            Message::PlayerKill { victim_deaths, .. } => assert_eq!(victim_deaths, 2),
            other => panic!("Expected second playerKill, got {:?}", other),
        }
    }
}

/// CLIENT SESSION TESTS
mod client_session_tests {
    use super::*;
    use client::network::Session;
    use client::reconciler::{self, FeedEvent};
    use client::session::SessionState;

    #[tokio::test]
    async fn server_frames_drive_the_client_session_end_to_end() {
        let url = start_server().await;

        let (mut socket, _) = connect_async(&url).await.unwrap();
        let mut session = SessionState::new("observer".to_string());

        reconciler::apply(&mut session, recv(&mut socket).await);
        assert_eq!(session.local_id, Some(1));
        // The roster seeds our own record into the tracked map
        assert!(session.tracked.contains_key(&1));

        let (mut peer, peer_id) = join(&url).await;

        // The join announcement is read off the wire but never reaches the
        // reconciler, standing in for a lost creation frame
        match recv(&mut socket).await {
            Message::PlayerJoined(player) => assert_eq!(player.id, peer_id),
            other => panic!("Expected playerJoined, got {:?}", other),
        }

        send(
            &mut peer,
            &Message::Position {
                position: Vec3::new(2.0, 0.0, 4.0),
                rotation: 0.3,
                animation: Animation::Walk,
                name: Some("Peer".to_string()),
            },
        )
        .await;

        // The relayed movement update creates the record lazily
        let events = reconciler::apply(&mut session, recv(&mut socket).await);
        assert_eq!(
            events,
            vec![
                FeedEvent::Joined { id: peer_id },
                FeedEvent::Updated { id: peer_id },
            ]
        );
        let tracked = &session.tracked[&peer_id];
        assert_eq!(tracked.state.position, Vec3::new(2.0, 0.0, 4.0));
        assert_eq!(tracked.state.name, "Peer");
        assert_eq!(tracked.state.health, 100);

        // The peer damages us; the resulting broadcast names our own id and
        // must not move our record, local input being the sole authority
        send(
            &mut peer,
            &Message::DirectDamage {
                target_id: 1,
                damage: None,
                new_health: None,
            },
        )
        .await;
        let frame = recv(&mut socket).await;
        match &frame {
            Message::PlayerUpdate(patch) => {
                assert_eq!(patch.id, Some(1));
                assert_eq!(patch.health, Some(90));
            }
            other => panic!("Expected playerUpdate, got {:?}", other),
        }
        let events = reconciler::apply(&mut session, frame);
        assert!(events.is_empty());
        assert_eq!(session.tracked[&1].state.health, 100);

        // Only the peer renders as a remote
        let remote_ids: Vec<u32> = session.remotes().map(|p| p.state.id).collect();
        assert_eq!(remote_ids, vec![peer_id]);
    }

    #[tokio::test]
    async fn session_send_reaches_the_other_clients() {
        let url = start_server().await;
        let (mut observer, _) = join(&url).await;

        let mut session = Session::connect(&url, "Ada".to_string(), 20)
            .await
            .expect("Failed to connect session");

        let peer_id = match recv(&mut observer).await {
            Message::PlayerJoined(player) => player.id,
            other => panic!("Expected playerJoined, got {:?}", other),
        };

        session
            .send(&Message::UpdateName {
                id: peer_id,
                name: "Ada".to_string(),
            })
            .await
            .unwrap();

        match recv(&mut observer).await {
            Message::NameUpdate { id, name } => {
                assert_eq!(id, peer_id);
                assert_eq!(name, "Ada");
            }
            other => panic!("Expected nameUpdate, got {:?}", other),
        }
    }
}

/// LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn disconnect_announces_and_frees_the_slot_without_id_reuse() {
        let url = start_server().await;
        let (first, first_id) = join(&url).await;
        let (mut second, _) = join(&url).await;

        drop(first);

        match recv(&mut second).await {
            Message::PlayerLeft { id, name } => {
                assert_eq!(id, first_id);
                assert_eq!(name, "Player 1");
            }
            other => panic!("Expected playerLeft, got {:?}", other),
        }

        // A later join gets a fresh id and a roster without the departed
        let (mut third, _) = connect_async(&url).await.unwrap();
        match recv(&mut third).await {
            Message::Init { id, players } => {
                assert_eq!(id, 3);
                let ids: Vec<u32> = players.iter().map(|p| p.id).collect();
                assert!(!ids.contains(&first_id));
            }
            other => panic!("Expected init, got {:?}", other),
        }
    }
}
