//! Event content kinds
//!
//! Content is a closed sum type with one variant per known event type and a
//! generic fallback that keeps any unrecognized incoming content verbatim.
//! Encoding goes through one `match` arm per kind; decoding picks the typed
//! kind from the event type tag and falls back to generic content when the
//! tag is unknown or the payload does not fit the typed shape.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::{EventType, Timestamp, UserId};

/// `m.room.create`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateContent {
    pub creator: UserId,
}

/// `m.room.name`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameContent {
    pub name: String,
}

/// `m.room.topic`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicContent {
    pub topic: String,
}

/// `m.room.aliases`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasesContent {
    pub aliases: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinRule {
    Public,
    Knock,
    Invite,
    Private,
}

/// `m.room.join_rules`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRulesContent {
    pub join_rule: JoinRule,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Invite,
    Join,
    Knock,
    Leave,
    Ban,
}

/// `m.room.member`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipContent {
    pub membership: Membership,
    #[serde(rename = "displayname", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// `m.room.power_levels`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerLevelsContent {
    pub ban: i64,
    pub kick: i64,
    pub redact: i64,
    pub users_default: i64,
    pub state_default: i64,
    pub events_default: i64,
    pub users: BTreeMap<UserId, i64>,
    pub events: BTreeMap<String, i64>,
}

impl Default for PowerLevelsContent {
    fn default() -> Self {
        PowerLevelsContent {
            ban: 50,
            kick: 50,
            redact: 50,
            users_default: 0,
            state_default: 50,
            events_default: 0,
            users: BTreeMap::new(),
            events: BTreeMap::new(),
        }
    }
}

/// Display name and avatar of a user
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "displayname", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Presence category
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Online,
    Unavailable,
    #[default]
    Offline,
    FreeForChat,
    Hidden,
}

impl PresenceState {
    pub fn as_str(self) -> &'static str {
        match self {
            PresenceState::Online => "online",
            PresenceState::Unavailable => "unavailable",
            PresenceState::Offline => "offline",
            PresenceState::FreeForChat => "free_for_chat",
            PresenceState::Hidden => "hidden",
        }
    }
}

/// Presence category, free-text message and last activity of a user
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub presence: PresenceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<Timestamp>,
}

/// Live presence of one user: two independently settable sub-records
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPresence {
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(flatten)]
    pub status: Status,
}

/// `m.presence`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceContent {
    pub user_id: UserId,
    #[serde(flatten)]
    pub presence: UserPresence,
}

/// `m.typing`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingContent {
    pub user_ids: Vec<UserId>,
}

/// Content of an event type this crate has no typed kind for
#[derive(Clone, Debug, PartialEq)]
pub struct GenericContent {
    pub event_type: EventType,
    pub content: Value,
}

/// Event content
#[derive(Clone, Debug, PartialEq)]
pub enum Content {
    Create(CreateContent),
    Name(NameContent),
    Topic(TopicContent),
    Aliases(AliasesContent),
    JoinRules(JoinRulesContent),
    Membership(MembershipContent),
    PowerLevels(PowerLevelsContent),
    Presence(PresenceContent),
    Typing(TypingContent),
    Generic(GenericContent),
}

impl Content {
    /// Event type tag this content travels under
    pub fn event_type(&self) -> EventType {
        match self {
            Content::Create(_) => EventType::Create,
            Content::Name(_) => EventType::Name,
            Content::Topic(_) => EventType::Topic,
            Content::Aliases(_) => EventType::Aliases,
            Content::JoinRules(_) => EventType::JoinRules,
            Content::Membership(_) => EventType::Membership,
            Content::PowerLevels(_) => EventType::PowerLevels,
            Content::Presence(_) => EventType::Presence,
            Content::Typing(_) => EventType::Typing,
            Content::Generic(c) => c.event_type.clone(),
        }
    }

    /// Decode incoming content for `event_type`.
    ///
    /// Never fails: anything that cannot be decoded into a typed kind is kept
    /// as [`GenericContent`].
    pub fn decode(event_type: EventType, value: Value) -> Content {
        fn typed<T: DeserializeOwned>(value: &Value) -> Option<T> {
            T::deserialize(value).ok()
        }

        let decoded = match event_type {
            EventType::Create => typed(&value).map(Content::Create),
            EventType::Name => typed(&value).map(Content::Name),
            EventType::Topic => typed(&value).map(Content::Topic),
            EventType::Aliases => typed(&value).map(Content::Aliases),
            EventType::JoinRules => typed(&value).map(Content::JoinRules),
            EventType::Membership => typed(&value).map(Content::Membership),
            EventType::PowerLevels => typed(&value).map(Content::PowerLevels),
            EventType::Presence => typed(&value).map(Content::Presence),
            EventType::Typing => typed(&value).map(Content::Typing),
            EventType::Custom(_) => None,
        };

        decoded.unwrap_or_else(|| {
            Content::Generic(GenericContent {
                event_type,
                content: value,
            })
        })
    }
}

impl Serialize for Content {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Content::Create(c) => c.serialize(serializer),
            Content::Name(c) => c.serialize(serializer),
            Content::Topic(c) => c.serialize(serializer),
            Content::Aliases(c) => c.serialize(serializer),
            Content::JoinRules(c) => c.serialize(serializer),
            Content::Membership(c) => c.serialize(serializer),
            Content::PowerLevels(c) => c.serialize(serializer),
            Content::Presence(c) => c.serialize(serializer),
            Content::Typing(c) => c.serialize(serializer),
            Content::Generic(c) => c.content.serialize(serializer),
        }
    }
}
