//! # Session Relay Client Library
//!
//! Client-side session layer for the shared 3D arena. The client holds a
//! belief about its own identity, a map of tracked player records mirroring
//! the server's registry, and the locally-controlled avatar. It is the sole
//! authority for its own pose: server echoes of the local player are
//! discarded, and only remote records are reconciled.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! The session state itself:
//! - Local avatar pose and name
//! - Tracked player records with render-pose interpolation
//! - The `remotes()` view presentation code renders from
//!
//! ### Reconciler Module (`reconciler`)
//! Folds inbound server messages into tracked records and emits a
//! normalized feed of join/leave/update/defeat events. Creates records
//! lazily when updates reference unknown ids.
//!
//! ### Identity Module (`identity`)
//! Periodic repair for a local id belief that has drifted away from every
//! tracked record.
//!
//! ### Emitter Module (`emitter`)
//! Snapshots the local avatar into movement frames on a fixed timer. The
//! movement channel carries pose only, never health.
//!
//! ### Network Module (`network`)
//! WebSocket transport and the `select!` loop tying the other modules to
//! their timers.

pub mod emitter;
pub mod identity;
pub mod network;
pub mod reconciler;
pub mod session;
