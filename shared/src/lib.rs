use serde::{Deserialize, Serialize};

pub const DEFAULT_HEALTH: i32 = 100;
pub const DEFAULT_DAMAGE: i32 = 10;
pub const DEFAULT_PORT: u16 = 3000;

/// Position in world space. The server never simulates movement; it stores
/// and relays whatever the owning client last reported.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Linear blend toward `target`, used by the client to smooth discrete
    /// position snapshots into continuous motion.
    pub fn lerp(&self, target: &Vec3, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);
        Vec3 {
            x: self.x + (target.x - self.x) * t,
            y: self.y + (target.y - self.y) * t,
            z: self.z + (target.z - self.z) * t,
        }
    }
}

/// Animation tags the clients report. The vocabulary is fixed; anything else
/// fails decoding and the frame is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Animation {
    #[default]
    Idle,
    Walk,
    Run,
    Jump,
    Punch,
    Die,
}

/// Authoritative-by-convention state for one connected participant.
///
/// Position, rotation and animation are last-write-wins from the owning
/// client. Health, kills and deaths are mutated only by the combat resolver
/// or an explicit health-bearing update, never by the movement channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub id: u32,
    pub position: Vec3,
    pub rotation: f32,
    pub animation: Animation,
    pub health: i32,
    pub max_health: i32,
    pub kills: u32,
    pub deaths: u32,
    pub name: String,
    pub color: String,
}

impl PlayerState {
    pub fn new(id: u32, color: String) -> Self {
        Self {
            id,
            position: Vec3::ZERO,
            rotation: 0.0,
            animation: Animation::Idle,
            health: DEFAULT_HEALTH,
            max_health: DEFAULT_HEALTH,
            kills: 0,
            deaths: 0,
            name: format!("Player {}", id),
            color,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Merges the fields present in `patch`; absent fields keep their prior
    /// values. The patch's `id` addresses a record, it never overwrites one.
    pub fn apply_patch(&mut self, patch: &PlayerPatch) {
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
        if let Some(animation) = patch.animation {
            self.animation = animation;
        }
        if let Some(health) = patch.health {
            self.health = health;
        }
        if let Some(ref name) = patch.name {
            self.name = name.clone();
        }
    }
}

/// Partial player update. Only the fields present on the wire are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PlayerPatch {
    /// Full snapshot of a record, used when the server broadcasts the result
    /// of a damage resolution to everyone.
    pub fn from_state(state: &PlayerState) -> Self {
        Self {
            id: Some(state.id),
            position: Some(state.position),
            rotation: Some(state.rotation),
            animation: Some(state.animation),
            health: Some(state.health),
            name: Some(state.name.clone()),
        }
    }
}

/// One-shot projectile relay. No state persists on the server; the event is
/// forwarded to the other clients with `player_id` stamped in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireballEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<u32>,
    pub position: Vec3,
    pub direction: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_point: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<i32>,
}

/// Every frame on the wire is one JSON text message shaped
/// `{"type": ..., "data": ...}`. Unknown tags fail the decode step and the
/// frame is dropped by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Message {
    /// Handshake, unicast to the new connection. The roster includes the new
    /// player's own record; clients filter it out.
    Init { id: u32, players: Vec<PlayerState> },
    /// Broadcast to the other connections when a player registers.
    PlayerJoined(PlayerState),
    /// Broadcast to all remaining connections on disconnect.
    PlayerLeft { id: u32, name: String },
    /// High-frequency movement channel. Health is structurally absent so the
    /// movement stream can never overwrite combat state.
    Position {
        position: Vec3,
        rotation: f32,
        animation: Animation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Partial record update, client to server and relayed to the others.
    PlayerUpdate(PlayerPatch),
    /// Rename request; the id must match the sender's own record.
    UpdateName { id: u32, name: String },
    /// Rename result, broadcast to all.
    NameUpdate { id: u32, name: String },
    #[serde(rename_all = "camelCase")]
    DirectDamage {
        target_id: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        damage: Option<i32>,
        /// Client-computed hint, accepted on the wire but ignored; the
        /// server derives the resulting health itself.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_health: Option<i32>,
    },
    /// Synonym for `directDamage`, handled identically.
    #[serde(rename_all = "camelCase")]
    DamagePlayer {
        target_id: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        damage: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_health: Option<i32>,
    },
    #[serde(rename_all = "camelCase")]
    PlayerKill {
        killer_id: u32,
        killer_kills: u32,
        victim_id: u32,
        victim_deaths: u32,
    },
    Fireball(FireballEvent),
}
