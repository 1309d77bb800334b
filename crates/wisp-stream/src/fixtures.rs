//! In-crate collaborator doubles for unit tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use wisp_core::{IndexedEvent, RoomId, UserId, WispError, WispResult};

use crate::{EventSink, Membership};

pub fn user(name: &str) -> UserId {
    UserId::new(name, "test.local").unwrap()
}

pub fn room(name: &str) -> RoomId {
    RoomId::new(name, "test.local").unwrap()
}

/// Fixed room rosters; peers are everyone sharing a room
#[derive(Default)]
pub struct Rooms {
    rosters: HashMap<RoomId, Vec<UserId>>,
    failing: AtomicBool,
}

impl Rooms {
    pub fn with_room(mut self, id: &RoomId, members: &[&UserId]) -> Self {
        self.rosters
            .insert(id.clone(), members.iter().map(|u| (*u).clone()).collect());
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> WispResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(WispError::membership("roster offline"));
        }
        Ok(())
    }
}

impl Membership for Rooms {
    fn peers_of(&self, user: &UserId) -> WispResult<HashSet<UserId>> {
        self.check()?;
        Ok(self
            .rosters
            .values()
            .filter(|members| members.contains(user))
            .flatten()
            .cloned()
            .collect())
    }

    fn members_of(&self, room: &RoomId) -> WispResult<Vec<UserId>> {
        self.check()?;
        Ok(self.rosters.get(room).cloned().unwrap_or_default())
    }

    fn rooms_of(&self, user: &UserId) -> WispResult<Vec<RoomId>> {
        self.check()?;
        Ok(self
            .rosters
            .iter()
            .filter(|(_, members)| members.contains(user))
            .map(|(id, _)| id.clone())
            .collect())
    }
}

/// Remembers every dispatch
#[derive(Default)]
pub struct Recorder {
    sent: Mutex<Vec<(Vec<UserId>, IndexedEvent)>>,
}

impl Recorder {
    pub fn sent(&self) -> Vec<(Vec<UserId>, IndexedEvent)> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl EventSink for Recorder {
    fn send(&self, recipients: &[UserId], event: &IndexedEvent) {
        self.sent.lock().push((recipients.to_vec(), event.clone()));
    }
}
