//! Presence stream
//!
//! Keyed by user. Each record holds a profile and a status; a mutation
//! replaces one of them and leaves the other alone. Every change goes to
//! the user's peers, resolved from membership on each update.

use std::collections::HashSet;
use std::sync::Arc;

use wisp_core::{
    Content, Event, EventId, IndexedEvent, PresenceContent, PresenceState, Profile, Status,
    Timestamp, UserId, UserPresence, WispResult,
};

use crate::{EventSink, IndexedStream, LiveRecord, Membership, StreamConfig, StreamKind};

/// Presence records: user -> profile + status
pub struct PresenceKind;

impl StreamKind for PresenceKind {
    type Key = UserId;
    type Content = UserPresence;
    const NAME: &'static str = "presence";

    fn event(user: &UserId, record: &LiveRecord<UserPresence>) -> Event {
        Event::new(
            EventId::ephemeral(Self::NAME, record.index),
            user.clone(),
            record.updated_at,
            Content::Presence(PresenceContent {
                user_id: user.clone(),
                presence: record.content.clone(),
            }),
        )
    }

    fn audience(membership: &dyn Membership, user: &UserId) -> WispResult<Vec<UserId>> {
        Ok(membership.peers_of(user)?.into_iter().collect())
    }
}

pub struct PresenceStream {
    stream: IndexedStream<PresenceKind>,
}

impl PresenceStream {
    pub fn new(membership: Arc<dyn Membership>, sink: Arc<dyn EventSink>) -> Self {
        Self::with_config(membership, sink, StreamConfig::default())
    }

    pub fn with_config(
        membership: Arc<dyn Membership>,
        sink: Arc<dyn EventSink>,
        config: StreamConfig,
    ) -> Self {
        PresenceStream {
            stream: IndexedStream::with_config(membership, sink, config),
        }
    }

    /// Replace the user's profile
    pub fn set_profile(&self, user: &UserId, profile: Profile) -> WispResult<IndexedEvent> {
        self.stream
            .update(user.clone(), user.clone(), |presence| presence.profile = profile)
    }

    /// Replace the user's status
    pub fn set_status(&self, user: &UserId, status: Status) -> WispResult<IndexedEvent> {
        self.stream
            .update(user.clone(), user.clone(), |presence| presence.status = status)
    }

    /// Merge the supplied status fields into the current status.
    ///
    /// A new category also stamps `last_active`. The merge runs inside a
    /// single update, so it never races another writer of the same user.
    /// Both fields absent still counts as an update.
    pub fn update_status(
        &self,
        user: &UserId,
        state: Option<PresenceState>,
        status_msg: Option<String>,
    ) -> WispResult<IndexedEvent> {
        self.stream.update(user.clone(), user.clone(), |presence| {
            let status = &mut presence.status;
            if let Some(state) = state {
                status.presence = state;
                status.last_active = Some(Timestamp::now());
            }
            if let Some(msg) = status_msg {
                status.status_msg = Some(msg);
            }
        })
    }

    pub fn presence(&self, user: &UserId) -> UserPresence {
        self.stream.get(user)
    }

    pub fn profile(&self, user: &UserId) -> Profile {
        self.stream.view(user, |presence| presence.profile.clone())
    }

    pub fn status(&self, user: &UserId) -> Status {
        self.stream.view(user, |presence| presence.status.clone())
    }

    pub fn max(&self) -> u64 {
        self.stream.max()
    }

    pub fn len(&self) -> usize {
        self.stream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }

    /// Presence events of `users` whose last index is in `[from, to)`
    pub fn range(
        &self,
        users: &HashSet<UserId>,
        from: u64,
        to: u64,
        limit: Option<usize>,
    ) -> Vec<IndexedEvent> {
        self.stream.range(users, from, to, limit)
    }
}
