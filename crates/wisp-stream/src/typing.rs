//! Typing stream
//!
//! Keyed by room. Each record holds the set of users currently typing in
//! the room; changes go to the room roster.
//!
//! Redundant toggles are asymmetric:
//! - starting to type while already typing consumes an index and advances
//!   the room's last index, but changes nothing and sends nothing;
//! - stopping while not typing leaves the set unchanged and still sends.
//!
//! A range query over such a room may therefore report an index that was
//! never delivered. Emptied rooms keep their record.

use std::collections::HashSet;
use std::sync::Arc;

use wisp_core::{
    Content, Event, EventId, IndexedEvent, RoomId, TypingContent, UserId, WispResult,
};

use crate::{
    Dispatch, EventSink, IndexedStream, LiveRecord, Membership, StreamConfig, StreamKind,
};

/// Typing records: room -> typing users
pub struct TypingKind;

impl StreamKind for TypingKind {
    type Key = RoomId;
    type Content = TypingContent;
    const NAME: &'static str = "typing";

    fn event(room: &RoomId, record: &LiveRecord<TypingContent>) -> Event {
        Event::new(
            EventId::ephemeral(Self::NAME, record.index),
            record.actor.clone(),
            record.updated_at,
            Content::Typing(record.content.clone()),
        )
        .in_room(room.clone())
    }

    fn audience(membership: &dyn Membership, room: &RoomId) -> WispResult<Vec<UserId>> {
        membership.members_of(room)
    }
}

pub struct TypingStream {
    stream: IndexedStream<TypingKind>,
    membership: Arc<dyn Membership>,
}

impl TypingStream {
    pub fn new(membership: Arc<dyn Membership>, sink: Arc<dyn EventSink>) -> Self {
        Self::with_config(membership, sink, StreamConfig::default())
    }

    pub fn with_config(
        membership: Arc<dyn Membership>,
        sink: Arc<dyn EventSink>,
        config: StreamConfig,
    ) -> Self {
        TypingStream {
            stream: IndexedStream::with_config(membership.clone(), sink, config),
            membership,
        }
    }

    /// Mark `user` as typing or not typing in `room`.
    ///
    /// Returns the dispatched event, or `None` when `user` was already
    /// typing (the index is consumed regardless).
    pub fn set_typing(
        &self,
        room: &RoomId,
        user: &UserId,
        typing: bool,
    ) -> WispResult<Option<IndexedEvent>> {
        let applied = self.stream.update_with(room.clone(), user.clone(), |content| {
            let typists = &mut content.user_ids;
            if typing {
                if typists.contains(user) {
                    return Dispatch::Suppress;
                }
                typists.push(user.clone());
            } else if let Some(pos) = typists.iter().position(|t| t == user) {
                typists.swap_remove(pos);
            }
            Dispatch::Notify
        })?;

        Ok(applied.dispatched.then_some(applied.event))
    }

    /// Users typing in `room`, in no particular order
    pub fn typing(&self, room: &RoomId) -> Vec<UserId> {
        self.stream.view(room, |content| content.user_ids.clone())
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

    /// Typing events of `rooms` whose last index is in `[from, to)`
    pub fn range(
        &self,
        rooms: &HashSet<RoomId>,
        from: u64,
        to: u64,
        limit: Option<usize>,
    ) -> Vec<IndexedEvent> {
        self.stream.range(rooms, from, to, limit)
    }

    /// Range query over every room `user` belongs to
    pub fn range_for_user(
        &self,
        user: &UserId,
        from: u64,
        to: u64,
        limit: Option<usize>,
    ) -> WispResult<Vec<IndexedEvent>> {
        if from >= to {
            return Ok(Vec::new());
        }
        let rooms: HashSet<RoomId> = self.membership.rooms_of(user)?.into_iter().collect();
        Ok(self.range(&rooms, from, to, limit))
    }
}
