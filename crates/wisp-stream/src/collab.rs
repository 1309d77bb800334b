//! External collaborators consumed by the streams

use std::collections::HashSet;

use wisp_core::{IndexedEvent, RoomId, UserId, WispResult};

/// Resolves who should hear about a subject's state.
///
/// Any method may fail with `WispError::MembershipUnavailable`.
pub trait Membership: Send + Sync {
    /// Users sharing at least one room with `user`
    fn peers_of(&self, user: &UserId) -> WispResult<HashSet<UserId>>;

    /// Current roster of `room`
    fn members_of(&self, room: &RoomId) -> WispResult<Vec<UserId>>;

    /// Rooms `user` belongs to
    fn rooms_of(&self, user: &UserId) -> WispResult<Vec<RoomId>>;
}

/// Delivery of indexed events to recipients.
///
/// Fire-and-forget: retries, queuing and backpressure belong to the
/// implementation. Streams make exactly one `send` per dispatched mutation.
pub trait EventSink: Send + Sync {
    fn send(&self, recipients: &[UserId], event: &IndexedEvent);
}
