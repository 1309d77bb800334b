//! Collaborator doubles and a wired-up system for end-to-end tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing_subscriber::EnvFilter;
use wisp_core::{IndexedEvent, RoomId, UserId, WispError, WispResult};
use wisp_stream::{EventSink, Membership, PresenceStream, TypingStream, WispConfig};

/// Domain used by every harness identifier
pub const TEST_DOMAIN: &str = "wisp.test";

/// `@name:wisp.test`
pub fn user(name: &str) -> UserId {
    UserId::new(name, TEST_DOMAIN).expect("harness user names are non-empty")
}

/// `!name:wisp.test`
pub fn room(name: &str) -> RoomId {
    RoomId::new(name, TEST_DOMAIN).expect("harness room names are non-empty")
}

/// Install a fmt subscriber filtered by `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory room rosters with outage injection
#[derive(Default)]
pub struct RoomDirectory {
    rosters: RwLock<HashMap<RoomId, Vec<UserId>>>,
    outage: AtomicBool,
    lookups: AtomicU64,
}

impl RoomDirectory {
    pub fn new() -> Self {
        RoomDirectory::default()
    }

    pub fn join(&self, room: &RoomId, user: &UserId) {
        let mut rosters = self.rosters.write();
        let members = rosters.entry(room.clone()).or_default();
        if !members.contains(user) {
            members.push(user.clone());
        }
    }

    pub fn leave(&self, room: &RoomId, user: &UserId) {
        if let Some(members) = self.rosters.write().get_mut(room) {
            members.retain(|m| m != user);
        }
    }

    /// While set, every lookup fails with `MembershipUnavailable`
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    /// Number of lookups served or failed so far
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }

    fn begin_lookup(&self) -> WispResult<()> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.outage.load(Ordering::SeqCst) {
            return Err(WispError::membership("room directory outage"));
        }
        Ok(())
    }
}

impl Membership for RoomDirectory {
    fn peers_of(&self, user: &UserId) -> WispResult<HashSet<UserId>> {
        self.begin_lookup()?;
        let rosters = self.rosters.read();
        Ok(rosters
            .values()
            .filter(|members| members.contains(user))
            .flatten()
            .cloned()
            .collect())
    }

    fn members_of(&self, room: &RoomId) -> WispResult<Vec<UserId>> {
        self.begin_lookup()?;
        Ok(self.rosters.read().get(room).cloned().unwrap_or_default())
    }

    fn rooms_of(&self, user: &UserId) -> WispResult<Vec<RoomId>> {
        self.begin_lookup()?;
        let rosters = self.rosters.read();
        Ok(rosters
            .iter()
            .filter(|(_, members)| members.contains(user))
            .map(|(id, _)| id.clone())
            .collect())
    }
}

/// One sink invocation
#[derive(Clone, Debug)]
pub struct Delivery {
    pub recipients: Vec<UserId>,
    pub event: IndexedEvent,
}

/// Sink that records every delivery in arrival order
#[derive(Default)]
pub struct RecordingSink {
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        RecordingSink::default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.deliveries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices in delivery order
    pub fn indices(&self) -> Vec<u64> {
        self.deliveries.lock().iter().map(|d| d.event.index).collect()
    }

    /// Events whose recipient list included `user`
    pub fn delivered_to(&self, user: &UserId) -> Vec<IndexedEvent> {
        self.deliveries
            .lock()
            .iter()
            .filter(|d| d.recipients.contains(user))
            .map(|d| d.event.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.deliveries.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn send(&self, recipients: &[UserId], event: &IndexedEvent) {
        self.deliveries.lock().push(Delivery {
            recipients: recipients.to_vec(),
            event: event.clone(),
        });
    }
}

/// Presence and typing streams sharing one directory and one sink
pub struct LiveSystem {
    pub directory: Arc<RoomDirectory>,
    pub sink: Arc<RecordingSink>,
    pub presence: Arc<PresenceStream>,
    pub typing: Arc<TypingStream>,
}

impl LiveSystem {
    pub fn new(config: &WispConfig) -> Self {
        let directory = Arc::new(RoomDirectory::new());
        let sink = Arc::new(RecordingSink::new());

        let presence = Arc::new(PresenceStream::with_config(
            directory.clone(),
            sink.clone(),
            config.presence.clone(),
        ));
        let typing = Arc::new(TypingStream::with_config(
            directory.clone(),
            sink.clone(),
            config.typing.clone(),
        ));

        LiveSystem {
            directory,
            sink,
            presence,
            typing,
        }
    }

    /// Fill `room` with `members`
    pub fn with_room(self, room_name: &str, members: &[&str]) -> Self {
        let id = room(room_name);
        for member in members {
            self.directory.join(&id, &user(member));
        }
        self
    }
}

impl Default for LiveSystem {
    fn default() -> Self {
        Self::new(&WispConfig::default())
    }
}
