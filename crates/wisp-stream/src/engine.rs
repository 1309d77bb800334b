//! Indexed live-state stream engine
//!
//! One stream keeps the latest content per subject together with the index
//! of the mutation that last touched it. Every mutation draws the next value
//! of a stream-wide counter, so indices are strictly increasing across all
//! subjects and never reused.
//!
//! The whole subject table sits behind a single reader/writer lock. Index
//! allocation and the content mutation happen under the exclusive lock;
//! audience resolution and sink dispatch happen either under it too
//! ([`DispatchMode::Locked`]) or right after releasing it
//! ([`DispatchMode::Deferred`]).
//!
//! Records are created on first mutation and never removed, so memory is
//! bounded by the number of distinct subjects ever seen.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};
use wisp_core::{Event, IndexedEvent, Timestamp, UserId, WispResult};

use crate::{DispatchMode, EventSink, Membership, StreamConfig};

/// What a stream stores and who hears about it
pub trait StreamKind: Send + Sync + 'static {
    type Key: Clone + Eq + Hash + fmt::Debug + Send + Sync;
    type Content: Clone + Default + Send + Sync;

    /// Used in event ids and log fields
    const NAME: &'static str;

    /// Build the event describing `record`
    fn event(key: &Self::Key, record: &LiveRecord<Self::Content>) -> Event;

    /// Recipients of a change to `key`, resolved fresh on every dispatch
    fn audience(membership: &dyn Membership, key: &Self::Key) -> WispResult<Vec<UserId>>;
}

/// Latest state of one subject
#[derive(Clone, Debug)]
pub struct LiveRecord<C> {
    pub content: C,
    /// Index of the last mutation applied to this record
    pub index: u64,
    /// User whose mutation produced `index`
    pub actor: UserId,
    pub updated_at: Timestamp,
}

impl<C: Default> LiveRecord<C> {
    fn new(actor: UserId, updated_at: Timestamp) -> Self {
        LiveRecord {
            content: C::default(),
            index: 0,
            actor,
            updated_at,
        }
    }
}

/// Returned by a mutation to say whether the change goes out
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Notify,
    /// Keep the allocated index but send nothing
    Suppress,
}

/// Outcome of a successful update
#[derive(Clone, Debug)]
pub struct Applied {
    pub event: IndexedEvent,
    pub dispatched: bool,
}

/// Indexed live-state stream
pub struct IndexedStream<S: StreamKind> {
    records: RwLock<HashMap<S::Key, LiveRecord<S::Content>>>,
    /// Next index to allocate; equals the number of mutations so far
    max: AtomicU64,
    membership: Arc<dyn Membership>,
    sink: Arc<dyn EventSink>,
    config: StreamConfig,
}

impl<S: StreamKind> IndexedStream<S> {
    pub fn new(membership: Arc<dyn Membership>, sink: Arc<dyn EventSink>) -> Self {
        Self::with_config(membership, sink, StreamConfig::default())
    }

    pub fn with_config(
        membership: Arc<dyn Membership>,
        sink: Arc<dyn EventSink>,
        config: StreamConfig,
    ) -> Self {
        IndexedStream {
            records: RwLock::new(HashMap::new()),
            max: AtomicU64::new(0),
            membership,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Mutate the subject's content and dispatch the result.
    pub fn update<F>(&self, key: S::Key, actor: UserId, mutation: F) -> WispResult<IndexedEvent>
    where
        F: FnOnce(&mut S::Content),
    {
        self.update_with(key, actor, |content| {
            mutation(content);
            Dispatch::Notify
        })
        .map(|applied| applied.event)
    }

    /// Allocate an index, mutate the subject's content and, unless the
    /// mutation returns [`Dispatch::Suppress`], resolve the audience and
    /// hand the event to the sink.
    ///
    /// The index is allocated and stored on the record before the mutation
    /// runs, so a suppressed mutation still consumes it. A membership
    /// failure is returned after the mutation has been applied; the
    /// mutation is not rolled back.
    pub fn update_with<F>(&self, key: S::Key, actor: UserId, mutation: F) -> WispResult<Applied>
    where
        F: FnOnce(&mut S::Content) -> Dispatch,
    {
        let mut records = self.records.write();
        let index = self.max.fetch_add(1, Ordering::SeqCst);
        let now = Timestamp::now();

        let record = records
            .entry(key.clone())
            .or_insert_with(|| LiveRecord::new(actor.clone(), now));
        record.index = index;
        record.actor = actor;
        record.updated_at = now;

        let dispatch = mutation(&mut record.content);
        let event = IndexedEvent::new(S::event(&key, record), index);

        if dispatch == Dispatch::Suppress {
            trace!(stream = S::NAME, subject = ?key, index, "dispatch suppressed");
            return Ok(Applied {
                event,
                dispatched: false,
            });
        }

        if self.config.dispatch == DispatchMode::Deferred {
            drop(records);
        }
        self.dispatch(&key, &event)?;

        Ok(Applied {
            event,
            dispatched: true,
        })
    }

    fn dispatch(&self, key: &S::Key, event: &IndexedEvent) -> WispResult<()> {
        let audience = S::audience(self.membership.as_ref(), key).map_err(|err| {
            warn!(
                stream = S::NAME,
                subject = ?key,
                index = event.index,
                error = %err,
                "audience unavailable, notification skipped"
            );
            err
        })?;

        debug!(
            stream = S::NAME,
            subject = ?key,
            index = event.index,
            recipients = audience.len(),
            "dispatching"
        );
        self.sink.send(&audience, event);
        Ok(())
    }

    /// Current content, or the default for a subject never mutated
    pub fn get(&self, key: &S::Key) -> S::Content {
        self.view(key, |content| content.clone())
    }

    /// Read part of the subject's content under the shared lock
    pub fn view<R>(&self, key: &S::Key, f: impl FnOnce(&S::Content) -> R) -> R {
        let records = self.records.read();
        match records.get(key) {
            Some(record) => f(&record.content),
            None => f(&<S::Content as Default>::default()),
        }
    }

    /// Number of indices allocated so far
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::SeqCst)
    }

    /// Number of subjects with a record
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events for the candidates whose last index lies in `[from, to)`,
    /// ordered by index. Only the candidates are examined; candidates
    /// without a record are skipped. When `limit` (capped by
    /// `max_range_limit`) truncates the result, the lowest indices are kept.
    pub fn range(
        &self,
        candidates: &HashSet<S::Key>,
        from: u64,
        to: u64,
        limit: Option<usize>,
    ) -> Vec<IndexedEvent> {
        if candidates.is_empty() || from >= to {
            return Vec::new();
        }

        let mut hits: Vec<IndexedEvent> = {
            let records = self.records.read();
            candidates
                .iter()
                .filter_map(|key| {
                    let record = records.get(key)?;
                    (from..to)
                        .contains(&record.index)
                        .then(|| IndexedEvent::new(S::event(key, record), record.index))
                })
                .collect()
        };

        hits.sort_unstable_by_key(|e| e.index);
        if let Some(limit) = self.config.effective_limit(limit) {
            hits.truncate(limit);
        }
        hits
    }
}
