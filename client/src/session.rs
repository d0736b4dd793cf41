//! Client session state: the local avatar, the assigned identity and the
//! tracked player records.
//!
//! The tracked map mirrors the server's registry, local record included —
//! the roster in `init` carries our own entry and keeping it tracked is
//! what lets identity recovery tell a drifted id from a healthy one.
//! Presentation code reads remote avatars through [`SessionState::remotes`],
//! which filters the local id out.
//!
//! Tracked records hold two poses: the last snapshot reported by the server
//! (the target) and the smoothed pose the presentation layer reads. The
//! reconciler only ever writes targets; `advance` blends the render pose
//! toward them so discrete, jittery snapshots come out as continuous
//! motion.

use shared::{Animation, PlayerPatch, PlayerState, Vec3};
use std::collections::HashMap;

/// Blend rate for remote pose smoothing, per second. At 10/s the render
/// pose covers ~63% of the remaining distance every 100ms.
pub const INTERPOLATION_RATE: f32 = 10.0;

/// The locally-controlled avatar. Mutated by the presentation layer's
/// input handling; the intent emitter snapshots it on a timer. Health is
/// deliberately not part of this struct: the local client never reports
/// its own health over the movement channel.
#[derive(Debug, Clone)]
pub struct LocalAvatar {
    pub position: Vec3,
    pub rotation: f32,
    pub animation: Animation,
    pub name: String,
}

impl LocalAvatar {
    pub fn new(name: String) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: 0.0,
            animation: Animation::Idle,
            name,
        }
    }
}

/// Client-side cached view of one participant's server record.
#[derive(Debug, Clone)]
pub struct TrackedPlayer {
    pub state: PlayerState,
    pub render_position: Vec3,
    pub render_rotation: f32,
}

impl TrackedPlayer {
    /// Tracks a player from a full record; the render pose starts exactly
    /// on the reported one.
    pub fn new(state: PlayerState) -> Self {
        let render_position = state.position;
        let render_rotation = state.rotation;
        Self {
            state,
            render_position,
            render_rotation,
        }
    }

    /// Lazy creation from a partial update referencing an id we have never
    /// seen. Absent fields take the defaults; the color stays empty until a
    /// full record arrives.
    pub fn from_patch(id: u32, patch: &PlayerPatch) -> Self {
        let mut state = PlayerState::new(id, String::new());
        state.apply_patch(patch);
        Self::new(state)
    }

    /// Merges a snapshot into the tracked state. Only the target pose
    /// moves; the render pose catches up in `advance`.
    pub fn apply_patch(&mut self, patch: &PlayerPatch) {
        self.state.apply_patch(patch);
    }

    /// Blends the render pose toward the last reported snapshot.
    pub fn advance(&mut self, dt: f32) {
        let t = (INTERPOLATION_RATE * dt).clamp(0.0, 1.0);
        self.render_position = self.render_position.lerp(&self.state.position, t);
        self.render_rotation += (self.state.rotation - self.render_rotation) * t;
    }
}

/// Everything the client knows about the session: its belief about its own
/// id, the local avatar and the tracked roster.
pub struct SessionState {
    pub local_id: Option<u32>,
    pub local: LocalAvatar,
    pub tracked: HashMap<u32, TrackedPlayer>,
}

impl SessionState {
    pub fn new(name: String) -> Self {
        Self {
            local_id: None,
            local: LocalAvatar::new(name),
            tracked: HashMap::new(),
        }
    }

    /// Whether an inbound id refers to the local player. Self-updates are
    /// filtered out before reconciliation; local input is the sole
    /// authority for the local avatar.
    pub fn is_self(&self, id: u32) -> bool {
        self.local_id == Some(id)
    }

    /// The remote avatars to render: every tracked record except our own.
    pub fn remotes(&self) -> impl Iterator<Item = &TrackedPlayer> {
        self.tracked
            .iter()
            .filter(move |(id, _)| self.local_id != Some(**id))
            .map(|(_, player)| player)
    }

    /// Advances remote pose smoothing. Driven by a fixed-period tick in the
    /// session runner.
    pub fn advance(&mut self, dt: f32) {
        for player in self.tracked.values_mut() {
            player.advance(dt);
        }
    }

    /// Drops all session state. Called when the transport closes; a
    /// reconnect starts from scratch.
    pub fn clear(&mut self) {
        self.local_id = None;
        self.tracked.clear();
    }
}
