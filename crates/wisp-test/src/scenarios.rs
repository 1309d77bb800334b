//! End-to-end scenarios over a wired-up [`LiveSystem`]
//!
//! Tests that exercise both streams through the shared room directory and
//! recording sink:
//! - Presence and typing walkthroughs
//! - Membership outages
//! - Locked versus deferred dispatch
//! - Wire shape of delivered events
//! - The status endpoint and its error mapping
//! - Concurrent writers and readers

use std::collections::HashSet;
use std::sync::{Arc, OnceLock, Weak};
use std::thread;

use serde_json::{json, Value};
use wisp_api::{error_response, PresenceEndpoint};
use wisp_core::{
    Content, Event, EventType, IndexedEvent, PresenceState, Profile, Status, UserId, WispError,
};
use wisp_stream::{
    DispatchMode, EventSink, PresenceStream, StreamConfig, TypingStream, WispConfig,
};

use crate::harness::{init_tracing, room, user, LiveSystem, RoomDirectory};

fn system() -> LiveSystem {
    init_tracing();
    LiveSystem::default()
        .with_room("lobby", &["alice", "bob", "carol"])
        .with_room("den", &["alice", "dave"])
}

fn deferred() -> WispConfig {
    WispConfig {
        presence: StreamConfig::deferred(),
        typing: StreamConfig::deferred(),
    }
}

fn online() -> Status {
    Status {
        presence: PresenceState::Online,
        ..Status::default()
    }
}

fn named(name: &str) -> Profile {
    Profile {
        display_name: Some(name.into()),
        avatar_url: None,
    }
}

fn sorted(mut users: Vec<UserId>) -> Vec<UserId> {
    users.sort();
    users
}

// ============================================================================
// PRESENCE
// ============================================================================

#[test]
fn test_presence_walkthrough() {
    let sys = system();

    let first = sys.presence.set_status(&user("alice"), online()).unwrap();
    let second = sys.presence.set_profile(&user("bob"), named("Bob")).unwrap();
    assert_eq!((first.index, second.index), (0, 1));

    assert_eq!(
        sys.presence.status(&user("alice")).presence,
        PresenceState::Online
    );
    assert_eq!(
        sys.presence.profile(&user("bob")).display_name.as_deref(),
        Some("Bob")
    );
    assert_eq!(sys.presence.max(), 2);
}

#[test]
fn test_presence_fans_out_across_rooms() {
    let sys = system();
    sys.presence.set_status(&user("alice"), online()).unwrap();

    let deliveries = sys.sink.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(
        sorted(deliveries[0].recipients.clone()),
        vec![user("alice"), user("bob"), user("carol"), user("dave")]
    );

    // dave shares no room with bob
    sys.presence.set_status(&user("bob"), online()).unwrap();
    assert_eq!(sys.sink.delivered_to(&user("dave")).len(), 1);
    assert_eq!(sys.sink.delivered_to(&user("carol")).len(), 2);
}

#[test]
fn test_presence_audience_follows_membership_changes() {
    let sys = system();
    sys.presence.set_status(&user("dave"), online()).unwrap();
    assert!(sys.sink.delivered_to(&user("bob")).is_empty());

    sys.directory.join(&room("den"), &user("bob"));
    sys.presence.set_profile(&user("dave"), named("Dave")).unwrap();
    assert_eq!(sys.sink.delivered_to(&user("bob")).len(), 1);
}

#[test]
fn test_presence_range_over_peers() {
    let sys = system();
    for who in ["alice", "bob", "carol", "dave"] {
        sys.presence.set_status(&user(who), online()).unwrap();
    }
    sys.presence.set_profile(&user("bob"), named("Bob")).unwrap();

    let peers = HashSet::from([user("alice"), user("bob"), user("carol")]);
    let hits = sys.presence.range(&peers, 1, sys.presence.max(), None);
    let indices: Vec<u64> = hits.iter().map(|e| e.index).collect();
    assert_eq!(indices, vec![2, 4]);
    assert_eq!(hits[1].event.user_id, user("bob"));
}

// ============================================================================
// TYPING
// ============================================================================

#[test]
fn test_typing_restart_is_silent() {
    let sys = system();
    let lobby = room("lobby");

    let first = sys.typing.set_typing(&lobby, &user("alice"), true).unwrap();
    assert_eq!(first.map(|e| e.index), Some(0));
    assert_eq!(sys.typing.typing(&lobby), vec![user("alice")]);

    let again = sys.typing.set_typing(&lobby, &user("alice"), true).unwrap();
    assert!(again.is_none());
    assert_eq!(sys.typing.max(), 2);
    assert_eq!(sys.typing.typing(&lobby), vec![user("alice")]);
    assert_eq!(sys.sink.len(), 1);
}

#[test]
fn test_typing_stop_without_start_notifies_room() {
    let sys = system();
    let lobby = room("lobby");
    sys.typing.set_typing(&lobby, &user("alice"), true).unwrap();
    sys.sink.clear();

    let event = sys.typing.set_typing(&lobby, &user("bob"), false).unwrap();
    assert!(event.is_some());
    assert_eq!(sys.typing.typing(&lobby), vec![user("alice")]);

    let deliveries = sys.sink.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(
        sorted(deliveries[0].recipients.clone()),
        vec![user("alice"), user("bob"), user("carol")]
    );
}

#[test]
fn test_typing_sync_for_user() {
    let sys = system();
    sys.typing.set_typing(&room("lobby"), &user("bob"), true).unwrap();
    sys.typing.set_typing(&room("den"), &user("dave"), true).unwrap();
    sys.typing.set_typing(&room("lobby"), &user("carol"), true).unwrap();

    let alice = sys.typing.range_for_user(&user("alice"), 0, 10, None).unwrap();
    assert_eq!(alice.iter().map(|e| e.index).collect::<Vec<_>>(), vec![1, 2]);

    let Content::Typing(lobby) = &alice[1].event.content else {
        panic!("expected typing content");
    };
    assert_eq!(
        sorted(lobby.user_ids.clone()),
        vec![user("bob"), user("carol")]
    );

    let carol = sys.typing.range_for_user(&user("carol"), 0, 10, None).unwrap();
    assert_eq!(carol.len(), 1);
    assert_eq!(carol[0].event.room_id, Some(room("lobby")));

    // incremental sync from the last seen index
    let since = sys.typing.range_for_user(&user("alice"), 2, 10, None).unwrap();
    assert_eq!(since.len(), 1);
}

#[test]
fn test_typing_range_for_user_skips_lookup_on_empty_window() {
    let sys = system();
    let before = sys.directory.lookups();
    assert!(sys
        .typing
        .range_for_user(&user("alice"), 3, 3, None)
        .unwrap()
        .is_empty());
    assert_eq!(sys.directory.lookups(), before);
}

#[test]
fn test_range_limit_cap_from_config() {
    let config = WispConfig::from_json_str(r#"{ "typing": { "max_range_limit": 1 } }"#).unwrap();
    let sys = LiveSystem::new(&config)
        .with_room("lobby", &["alice", "bob"])
        .with_room("den", &["alice"]);

    sys.typing.set_typing(&room("den"), &user("alice"), true).unwrap();
    sys.typing.set_typing(&room("lobby"), &user("bob"), true).unwrap();

    let hits = sys.typing.range_for_user(&user("alice"), 0, 10, Some(5)).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].index, 0);
}

// ============================================================================
// MEMBERSHIP OUTAGES
// ============================================================================

#[test]
fn test_outage_applies_mutation_without_delivery() {
    let sys = system();
    sys.directory.set_outage(true);

    let err = sys.presence.set_status(&user("alice"), online()).unwrap_err();
    assert!(matches!(err, WispError::MembershipUnavailable(_)));
    let err = sys
        .typing
        .set_typing(&room("lobby"), &user("bob"), true)
        .unwrap_err();
    assert!(matches!(err, WispError::MembershipUnavailable(_)));

    assert!(sys.sink.is_empty());
    assert_eq!(sys.presence.status(&user("alice")), online());
    assert_eq!(sys.typing.typing(&room("lobby")), vec![user("bob")]);
    assert_eq!((sys.presence.max(), sys.typing.max()), (1, 1));

    // undelivered changes are still visible to range queries
    let alice = HashSet::from([user("alice")]);
    assert_eq!(sys.presence.range(&alice, 0, 1, None).len(), 1);

    sys.directory.set_outage(false);
    let next = sys.presence.set_profile(&user("alice"), named("Al")).unwrap();
    assert_eq!(next.index, 1);
    assert_eq!(sys.sink.indices(), vec![1]);
}

#[test]
fn test_outage_surfaces_as_unavailable() {
    let sys = system();
    let endpoint = PresenceEndpoint::new(sys.presence.clone());
    sys.directory.set_outage(true);

    let alice = user("alice");
    let err = endpoint
        .set_status(&alice, alice.as_str(), br#"{"presence": "online"}"#)
        .unwrap_err();
    let (status, body) = error_response(&err);
    assert_eq!(status, 503);
    assert_eq!(serde_json::to_value(body).unwrap()["errcode"], "M_UNAVAILABLE");

    // state was still updated
    let got = endpoint.get_status(&alice, alice.as_str()).unwrap();
    assert_eq!(got.presence, PresenceState::Online);
}

// ============================================================================
// STATUS ENDPOINT
// ============================================================================

#[test]
fn test_endpoint_updates_are_delivered() {
    let sys = system();
    let endpoint = PresenceEndpoint::new(sys.presence.clone());
    let bob = user("bob");

    endpoint
        .set_status(&bob, bob.as_str(), br#"{"presence": "unavailable", "status_msg": "away"}"#)
        .unwrap();

    let events = sys.sink.delivered_to(&user("carol"));
    assert_eq!(events.len(), 1);
    let Content::Presence(content) = &events[0].event.content else {
        panic!("expected presence content");
    };
    assert_eq!(content.user_id, bob);
    assert_eq!(content.presence.status.presence, PresenceState::Unavailable);
    assert_eq!(content.presence.status.status_msg.as_deref(), Some("away"));
}

#[test]
fn test_endpoint_rejections_map_to_bad_json() {
    let sys = system();
    let endpoint = PresenceEndpoint::new(sys.presence.clone());
    let bob = user("bob");

    let bodies: [&[u8]; 3] = [b"", b"{}", br#"{"presence": 5}"#];
    for body in bodies {
        let err = endpoint.set_status(&bob, bob.as_str(), body).unwrap_err();
        assert_eq!(error_response(&err).0, 400, "{err}");
    }

    let err = endpoint.get_status(&bob, "!lobby:wisp.test").unwrap_err();
    assert_eq!(error_response(&err).0, 400);

    assert_eq!(sys.presence.max(), 0);
    assert!(sys.sink.is_empty());
}

// ============================================================================
// WIRE SHAPE
// ============================================================================

fn wire(event: &IndexedEvent) -> Value {
    serde_json::to_value(&event.event).unwrap()
}

#[test]
fn test_presence_event_on_the_wire() {
    let sys = system();
    let alice = user("alice");
    sys.presence
        .set_profile(&alice, Profile {
            display_name: Some("Alice".into()),
            avatar_url: Some("mxc://wisp.test/a".into()),
        })
        .unwrap();
    let event = sys
        .presence
        .update_status(&alice, Some(PresenceState::Online), None)
        .unwrap();

    let value = wire(&event);
    assert_eq!(value["event_id"], "$presence_1");
    assert_eq!(value["type"], "m.presence");
    assert_eq!(value["user_id"], "@alice:wisp.test");
    assert!(value.get("room_id").is_none());
    assert!(value["origin_server_ts"].is_i64());

    let content = &value["content"];
    assert_eq!(content["user_id"], "@alice:wisp.test");
    assert_eq!(content["displayname"], "Alice");
    assert_eq!(content["avatar_url"], "mxc://wisp.test/a");
    assert_eq!(content["presence"], "online");
    assert!(content["last_active"].is_i64());
}

#[test]
fn test_typing_event_on_the_wire() {
    let sys = system();
    let event = sys
        .typing
        .set_typing(&room("den"), &user("dave"), true)
        .unwrap()
        .unwrap();

    let value = wire(&event);
    assert_eq!(value["event_id"], "$typing_0");
    assert_eq!(value["type"], "m.typing");
    assert_eq!(value["room_id"], "!den:wisp.test");
    assert_eq!(value["user_id"], "@dave:wisp.test");
    assert_eq!(value["content"], json!({ "user_ids": ["@dave:wisp.test"] }));

    let decoded: Event = serde_json::from_value(value).unwrap();
    assert_eq!(decoded, event.event);
}

#[test]
fn test_range_returns_what_was_delivered() {
    let sys = system();
    sys.typing.set_typing(&room("lobby"), &user("bob"), true).unwrap();
    sys.presence.set_status(&user("carol"), online()).unwrap();

    let delivered = sys.sink.deliveries();
    let typing = sys
        .typing
        .range(&HashSet::from([room("lobby")]), 0, 1, None);
    let presence = sys
        .presence
        .range(&HashSet::from([user("carol")]), 0, 1, None);

    assert_eq!(typing, vec![delivered[0].event.clone()]);
    assert_eq!(presence, vec![delivered[1].event.clone()]);
    assert_eq!(delivered[0].event.event.event_type(), EventType::Typing);
}

// ============================================================================
// DISPATCH MODES
// ============================================================================

#[test]
fn test_dispatch_modes_agree_sequentially() {
    let locked = system();
    let deferred = LiveSystem::new(&deferred())
        .with_room("lobby", &["alice", "bob", "carol"])
        .with_room("den", &["alice", "dave"]);

    for sys in [&locked, &deferred] {
        sys.presence.set_status(&user("alice"), online()).unwrap();
        sys.typing.set_typing(&room("lobby"), &user("bob"), true).unwrap();
        sys.typing.set_typing(&room("lobby"), &user("bob"), true).unwrap();
        sys.typing.set_typing(&room("lobby"), &user("bob"), false).unwrap();
        sys.presence.set_profile(&user("dave"), named("D")).unwrap();
    }

    assert_eq!(locked.sink.indices(), deferred.sink.indices());
    assert_eq!(locked.typing.max(), deferred.typing.max());
    assert_eq!(
        locked.presence.presence(&user("dave")),
        deferred.presence.presence(&user("dave"))
    );
}

/// Sink that reads the stream it is attached to while handling a delivery
#[derive(Default)]
struct Reentrant {
    stream: OnceLock<Weak<PresenceStream>>,
    seen: parking_lot::Mutex<Vec<Status>>,
}

impl EventSink for Reentrant {
    fn send(&self, _recipients: &[UserId], event: &IndexedEvent) {
        if let Some(stream) = self.stream.get().and_then(Weak::upgrade) {
            self.seen.lock().push(stream.status(&event.event.user_id));
        }
    }
}

#[test]
fn test_deferred_dispatch_releases_lock_before_sink() {
    let directory = Arc::new(RoomDirectory::new());
    directory.join(&room("lobby"), &user("alice"));
    let sink = Arc::new(Reentrant::default());
    let stream = Arc::new(PresenceStream::with_config(
        directory,
        sink.clone(),
        StreamConfig::deferred(),
    ));
    let _ = sink.stream.set(Arc::downgrade(&stream));

    stream.set_status(&user("alice"), online()).unwrap();
    assert_eq!(sink.seen.lock().clone(), vec![online()]);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

/// Profile whose two fields always carry the same tag
fn tagged_profile(tag: usize) -> Profile {
    Profile {
        display_name: Some(format!("name-{tag}")),
        avatar_url: Some(format!("mxc://wisp.test/{tag}")),
    }
}

fn profile_is_whole(profile: &Profile) -> bool {
    match (&profile.display_name, &profile.avatar_url) {
        (None, None) => true,
        (Some(name), Some(url)) => {
            name.strip_prefix("name-") == url.strip_prefix("mxc://wisp.test/")
        }
        _ => false,
    }
}

fn status_is_whole(status: &Status) -> bool {
    match (&status.status_msg, status.presence) {
        (None, PresenceState::Offline) => true,
        (Some(msg), PresenceState::Online) => msg.starts_with("on-"),
        (Some(msg), PresenceState::Unavailable) => msg.starts_with("away-"),
        _ => false,
    }
}

fn hammer_two_subjects(sys: &LiveSystem) {
    let (alice, bob) = (user("alice"), user("bob"));
    let rounds = 200;

    thread::scope(|scope| {
        for who in [&alice, &bob] {
            let presence = &sys.presence;
            scope.spawn(move || {
                for i in 0..rounds {
                    presence.set_profile(who, tagged_profile(i)).unwrap();
                }
            });
            scope.spawn(move || {
                for i in 0..rounds {
                    let (state, msg) = if i % 2 == 0 {
                        (PresenceState::Online, format!("on-{i}"))
                    } else {
                        (PresenceState::Unavailable, format!("away-{i}"))
                    };
                    presence.update_status(who, Some(state), Some(msg)).unwrap();
                }
            });
        }

        for _ in 0..2 {
            scope.spawn(|| {
                for _ in 0..rounds {
                    for who in [&alice, &bob] {
                        let seen = sys.presence.presence(who);
                        assert!(profile_is_whole(&seen.profile), "{:?}", seen.profile);
                        assert!(status_is_whole(&seen.status), "{:?}", seen.status);
                    }
                }
            });
        }
    });

    assert_eq!(sys.presence.max(), 4 * rounds as u64);
    assert_eq!(sys.presence.profile(&alice), tagged_profile(rounds - 1));
    assert_eq!(sys.presence.profile(&bob), tagged_profile(rounds - 1));
}

#[test]
fn test_concurrent_writers_never_tear_a_record() {
    hammer_two_subjects(&system());
}

#[test]
fn test_concurrent_writers_never_tear_a_record_deferred() {
    let sys = LiveSystem::new(&deferred()).with_room("lobby", &["alice", "bob"]);
    hammer_two_subjects(&sys);
}

#[test]
fn test_locked_dispatch_delivers_in_index_order() {
    let sys = system();
    let members = ["alice", "bob", "carol"];

    thread::scope(|scope| {
        for who in members {
            let typing = &sys.typing;
            scope.spawn(move || {
                let (lobby, me) = (room("lobby"), user(who));
                for i in 0..100 {
                    typing.set_typing(&lobby, &me, i % 2 == 0).unwrap();
                }
            });
        }
    });

    let indices = sys.sink.indices();
    assert_eq!(indices.len(), 300);
    assert!(indices.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(sys.typing.max(), 300);
    assert!(sys.typing.typing(&room("lobby")).is_empty());
}

#[test]
fn test_config_dispatch_mode_is_applied() {
    let config = WispConfig::from_json_str(r#"{ "presence": { "dispatch": "deferred" } }"#).unwrap();
    assert_eq!(config.presence.dispatch, DispatchMode::Deferred);

    let directory = Arc::new(RoomDirectory::new());
    let sink = Arc::new(crate::harness::RecordingSink::new());
    let typing = TypingStream::with_config(directory, sink.clone(), config.typing);
    typing.set_typing(&room("void"), &user("alice"), true).unwrap();

    // a room with no members still dispatches, to nobody
    assert_eq!(sink.len(), 1);
    assert!(sink.deliveries()[0].recipients.is_empty());
}
