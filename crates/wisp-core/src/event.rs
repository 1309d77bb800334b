//! Event definitions
//!
//! An event is an envelope (identity, room, sender, type tag, timestamp)
//! around a [`Content`]. State events add a state key and the content they
//! replaced. Indexed events pair an event with the stream index it was
//! assigned when it was created.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{Content, EventId, RoomId, Timestamp, UserId};

/// Event type tag
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Create,
    Name,
    Topic,
    Aliases,
    JoinRules,
    Membership,
    PowerLevels,
    Presence,
    Typing,
    /// Any tag without a typed content kind
    Custom(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Create => "m.room.create",
            EventType::Name => "m.room.name",
            EventType::Topic => "m.room.topic",
            EventType::Aliases => "m.room.aliases",
            EventType::JoinRules => "m.room.join_rules",
            EventType::Membership => "m.room.member",
            EventType::PowerLevels => "m.room.power_levels",
            EventType::Presence => "m.presence",
            EventType::Typing => "m.typing",
            EventType::Custom(tag) => tag,
        }
    }
}

impl From<&str> for EventType {
    fn from(tag: &str) -> Self {
        match tag {
            "m.room.create" => EventType::Create,
            "m.room.name" => EventType::Name,
            "m.room.topic" => EventType::Topic,
            "m.room.aliases" => EventType::Aliases,
            "m.room.join_rules" => EventType::JoinRules,
            "m.room.member" => EventType::Membership,
            "m.room.power_levels" => EventType::PowerLevels,
            "m.presence" => EventType::Presence,
            "m.typing" => EventType::Typing,
            other => EventType::Custom(other.to_string()),
        }
    }
}

impl From<String> for EventType {
    fn from(tag: String) -> Self {
        match EventType::from(tag.as_str()) {
            EventType::Custom(_) => EventType::Custom(tag),
            known => known,
        }
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::Custom(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventType({})", self.as_str())
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event envelope
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub event_id: EventId,
    pub room_id: Option<RoomId>,
    /// Sender
    pub user_id: UserId,
    pub timestamp: Timestamp,
    pub content: Content,
}

impl Event {
    pub fn new(event_id: EventId, user_id: UserId, timestamp: Timestamp, content: Content) -> Self {
        Event {
            event_id,
            room_id: None,
            user_id,
            timestamp,
            content,
        }
    }

    pub fn in_room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    /// The type tag is always derived from the content
    pub fn event_type(&self) -> EventType {
        self.content.event_type()
    }

    fn serialize_envelope<M: SerializeMap>(&self, map: &mut M) -> Result<(), M::Error> {
        map.serialize_entry("event_id", &self.event_id)?;
        if let Some(room_id) = &self.room_id {
            map.serialize_entry("room_id", room_id)?;
        }
        map.serialize_entry("user_id", &self.user_id)?;
        map.serialize_entry("type", &self.event_type())?;
        map.serialize_entry("origin_server_ts", &self.timestamp)?;
        map.serialize_entry("content", &self.content)
    }
}

/// Wire form of the envelope, before content decoding
#[derive(Deserialize)]
struct RawEvent {
    event_id: EventId,
    #[serde(default)]
    room_id: Option<RoomId>,
    user_id: UserId,
    #[serde(rename = "type")]
    event_type: EventType,
    origin_server_ts: Timestamp,
    #[serde(default)]
    content: Value,
}

impl From<RawEvent> for Event {
    fn from(raw: RawEvent) -> Self {
        Event {
            event_id: raw.event_id,
            room_id: raw.room_id,
            user_id: raw.user_id,
            timestamp: raw.origin_server_ts,
            content: Content::decode(raw.event_type, raw.content),
        }
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        self.serialize_envelope(&mut map)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawEvent::deserialize(deserializer).map(Event::from)
    }
}

/// State event - an event that sets room state under a state key
#[derive(Clone, Debug, PartialEq)]
pub struct StateEvent {
    pub event: Event,
    pub state_key: String,
    /// Content this event replaced; encoded as `null` when absent and as
    /// the bare content object (never a full envelope) when present
    pub prior_content: Option<Content>,
}

impl StateEvent {
    pub fn new(event: Event, state_key: impl Into<String>) -> Self {
        StateEvent {
            event,
            state_key: state_key.into(),
            prior_content: None,
        }
    }

    /// Record the state this event replaces
    pub fn replacing(mut self, prior: &StateEvent) -> Self {
        self.prior_content = Some(prior.event.content.clone());
        self
    }
}

#[derive(Deserialize)]
struct RawStateEvent {
    #[serde(flatten)]
    event: RawEvent,
    state_key: String,
    #[serde(default)]
    prev_content: Option<Value>,
}

impl Serialize for StateEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        self.event.serialize_envelope(&mut map)?;
        map.serialize_entry("state_key", &self.state_key)?;
        map.serialize_entry("prev_content", &self.prior_content)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for StateEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawStateEvent::deserialize(deserializer)?;
        let prior_content = raw
            .prev_content
            .map(|value| Content::decode(raw.event.event_type.clone(), value));

        Ok(StateEvent {
            event: Event::from(raw.event),
            state_key: raw.state_key,
            prior_content,
        })
    }
}

/// An event together with the stream index assigned at its creation
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedEvent {
    pub event: Event,
    pub index: u64,
}

impl IndexedEvent {
    pub fn new(event: Event, index: u64) -> Self {
        IndexedEvent { event, index }
    }
}
