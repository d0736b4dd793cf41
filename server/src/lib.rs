//! # Session Relay Server Library
//!
//! Authoritative multiplayer session server for a shared 3D arena. The
//! server keeps one player record per live WebSocket connection, applies
//! client-reported movement and combat events to those records, and relays
//! the results to every other participant. It is deliberately not a physics
//! authority: positions, rotations and animations are last-write-wins from
//! the owning client, and the only state the server computes itself is
//! hit-point bookkeeping.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! The connection registry and broadcast fanout:
//! - Identity assignment (monotonic player ids, never reused)
//! - Connection-to-record mapping and lookup by player id
//! - `to_others` / `to_all` fire-and-forget fanout primitives
//!
//! ### Router Module (`router`)
//! Per-message dispatch and the combat resolver:
//! - Tagged message decode that fails closed on unknown types
//! - Movement vs. explicit-update channel separation (the movement path
//!   cannot carry health)
//! - Damage application with clamping and single-shot defeat accounting
//!
//! ### Network Module (`network`)
//! WebSocket transport plumbing:
//! - Accept loop and per-connection reader tasks
//! - Per-connection writer tasks decoupling slow clients from broadcasts
//! - Disconnect detection driving unregister-and-announce cleanup
//!
//! ## Concurrency Model
//!
//! Messages from one connection are handled strictly in order and to
//! completion under the registry write lock; messages from different
//! connections interleave between those atomic handlers. No player record
//! has its own lock: a record is only ever written by its owning
//! connection's handler, except for the combat resolver mutating the damage
//! target, and both run under the same registry lock.

pub mod network;
pub mod registry;
pub mod router;
