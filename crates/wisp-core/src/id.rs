//! Identity types for Wisp
//!
//! Identifiers are sigil-prefixed strings:
//! - users:  `@localpart:domain`
//! - rooms:  `!opaque:domain`
//! - events: `$opaque` with an optional `:domain`
//!
//! All of them travel over the wire as plain JSON strings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{WispError, WispResult};

/// Validate `sigil + localpart [":" domain]`.
fn check_id(kind: &'static str, sigil: char, value: &str, domain_required: bool) -> WispResult<()> {
    let invalid = || WispError::InvalidId {
        kind,
        value: value.to_string(),
    };

    let rest = value.strip_prefix(sigil).ok_or_else(invalid)?;
    match rest.split_once(':') {
        Some((local, domain)) => {
            if local.is_empty() || domain.is_empty() {
                return Err(invalid());
            }
        }
        None => {
            if domain_required || rest.is_empty() {
                return Err(invalid());
            }
        }
    }
    Ok(())
}

/// User identity
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub const SIGIL: char = '@';

    pub fn parse(value: impl Into<String>) -> WispResult<Self> {
        let value = value.into();
        check_id("user", Self::SIGIL, &value, true)?;
        Ok(UserId(value))
    }

    /// Build from parts; both must be non-empty
    pub fn new(localpart: &str, domain: &str) -> WispResult<Self> {
        Self::parse(format!("{}{}:{}", Self::SIGIL, localpart, domain))
    }

    pub fn localpart(&self) -> &str {
        let rest = &self.0[1..];
        rest.split_once(':').map(|(l, _)| l).unwrap_or(rest)
    }

    pub fn domain(&self) -> &str {
        self.0.split_once(':').map(|(_, d)| d).unwrap_or("")
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = WispError;

    fn try_from(value: String) -> WispResult<Self> {
        Self::parse(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room identity
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    pub const SIGIL: char = '!';

    pub fn parse(value: impl Into<String>) -> WispResult<Self> {
        let value = value.into();
        check_id("room", Self::SIGIL, &value, true)?;
        Ok(RoomId(value))
    }

    pub fn new(opaque: &str, domain: &str) -> WispResult<Self> {
        Self::parse(format!("{}{}:{}", Self::SIGIL, opaque, domain))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = WispError;

    fn try_from(value: String) -> WispResult<Self> {
        Self::parse(value)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl fmt::Debug for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Room({})", self.0)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Event identity
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(String);

impl EventId {
    pub const SIGIL: char = '$';

    pub fn parse(value: impl Into<String>) -> WispResult<Self> {
        let value = value.into();
        check_id("event", Self::SIGIL, &value, false)?;
        Ok(EventId(value))
    }

    /// Identity of a live-state event: unique per stream because
    /// the index is never reused within a stream.
    pub fn ephemeral(stream: &str, index: u64) -> Self {
        EventId(format!("{}{}_{}", Self::SIGIL, stream, index))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EventId {
    type Error = WispError;

    fn try_from(value: String) -> WispResult<Self> {
        Self::parse(value)
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.0
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
