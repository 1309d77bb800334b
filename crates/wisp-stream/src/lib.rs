//! Wisp Streams - Indexed live-state distribution
//!
//! This crate implements the live-state streams:
//! - A generic indexed stream engine (last-value cache per subject,
//!   stream-wide index counter, range queries for feed catch-up)
//! - Presence stream (per-user profile and status, fanned out to peers)
//! - Typing stream (per-room typing set, fanned out to the room roster)
//! - Collaborator seams for membership resolution and event delivery
//! - Stream configuration

pub mod collab;
pub mod config;
pub mod engine;
pub mod presence;
pub mod typing;

#[cfg(test)]
pub(crate) mod fixtures;

pub use collab::*;
pub use config::*;
pub use engine::*;
pub use presence::*;
pub use typing::*;
