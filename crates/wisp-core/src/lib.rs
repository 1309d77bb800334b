//! Wisp Core - Fundamental types
//!
//! This crate defines the types shared by every Wisp crate:
//! - Identifiers (UserId, RoomId, EventId)
//! - Wire timestamps
//! - The event envelope, state events and indexed events
//! - Event content kinds
//! - Error taxonomy

pub mod id;
pub mod time;
pub mod content;
pub mod event;
pub mod error;

pub use id::*;
pub use time::*;
pub use content::*;
pub use event::*;
pub use error::*;
