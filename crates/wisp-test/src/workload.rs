//! Concurrent workload generator
//!
//! Drives both streams of a [`LiveSystem`] from several threads with a
//! seeded random mix of presence and typing mutations, then checks:
//! - index density: every stream's indices are unique and cover `0..max`
//! - last-writer state: each subject ends with the content of its last mutation
//! - range consistency: a full range query reports each subject's last index
//! - delivery order: under locked dispatch, the sink sees indices in order
//!
//! Every user is owned by exactly one worker, so the expected final state of
//! each user is known without coordinating between workers. Rooms are shared.

use std::collections::{HashMap, HashSet};
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};
use wisp_core::{Content, EventType, PresenceState, Profile, RoomId, UserId};
use wisp_stream::{DispatchMode, StreamConfig, WispConfig};

use crate::harness::{room, user, Delivery, LiveSystem};

const STATES: [PresenceState; 4] = [
    PresenceState::Online,
    PresenceState::Unavailable,
    PresenceState::Offline,
    PresenceState::FreeForChat,
];

/// Workload configuration
#[derive(Clone, Debug)]
pub struct WorkloadConfig {
    /// Number of worker threads
    pub threads: usize,
    /// Users owned by each worker
    pub users_per_thread: usize,
    /// Rooms shared by all users
    pub rooms: usize,
    /// Mutations issued by each worker
    pub ops_per_thread: usize,
    /// Probability that a mutation targets the typing stream
    pub typing_ratio: f64,
    /// Dispatch mode for both streams
    pub dispatch: DispatchMode,
    /// Random seed; worker `n` uses `seed + n`
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        WorkloadConfig {
            threads: 4,
            users_per_thread: 4,
            rooms: 3,
            ops_per_thread: 500,
            typing_ratio: 0.5,
            dispatch: DispatchMode::Locked,
            seed: 42,
        }
    }
}

impl WorkloadConfig {
    /// Quick run for unit tests
    pub fn light() -> Self {
        WorkloadConfig {
            threads: 2,
            users_per_thread: 3,
            rooms: 2,
            ops_per_thread: 100,
            ..WorkloadConfig::default()
        }
    }

    /// Heavier contention
    pub fn heavy() -> Self {
        WorkloadConfig {
            threads: 8,
            users_per_thread: 6,
            rooms: 4,
            ops_per_thread: 2000,
            ..WorkloadConfig::default()
        }
    }

    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn wisp_config(&self) -> WispConfig {
        let stream = StreamConfig {
            dispatch: self.dispatch,
            ..StreamConfig::default()
        };
        WispConfig {
            presence: stream.clone(),
            typing: stream,
        }
    }
}

/// What one worker did and what it expects to see afterwards
#[derive(Default)]
struct WorkerLog {
    presence_ops: u64,
    typing_ops: u64,
    suppressed: u64,
    profiles: HashMap<UserId, Profile>,
    statuses: HashMap<UserId, (PresenceState, Option<String>)>,
    last_presence_index: HashMap<UserId, u64>,
    typing: HashMap<(RoomId, UserId), bool>,
    violations: Vec<String>,
}

/// Outcome of a workload run
#[derive(Debug, Default)]
pub struct WorkloadReport {
    pub presence_ops: u64,
    pub typing_ops: u64,
    /// Redundant typing starts that consumed an index without dispatching
    pub suppressed: u64,
    pub deliveries: usize,
    pub violations: Vec<String>,
}

impl WorkloadReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Multi-threaded workload over a fresh [`LiveSystem`]
pub struct Workload {
    config: WorkloadConfig,
    system: LiveSystem,
    rooms: Vec<RoomId>,
}

impl Workload {
    pub fn new(config: WorkloadConfig) -> Self {
        let system = LiveSystem::new(&config.wisp_config());
        let rooms: Vec<RoomId> = (0..config.rooms).map(|r| room(&format!("r{r}"))).collect();

        for t in 0..config.threads {
            for u in 0..config.users_per_thread {
                let member = Self::owned_user(t, u);
                for room in &rooms {
                    system.directory.join(room, &member);
                }
            }
        }

        Workload {
            config,
            system,
            rooms,
        }
    }

    pub fn system(&self) -> &LiveSystem {
        &self.system
    }

    fn owned_user(thread: usize, n: usize) -> UserId {
        user(&format!("w{thread}u{n}"))
    }

    /// Run all workers to completion and check the resulting state
    pub fn run(&self) -> WorkloadReport {
        info!(
            threads = self.config.threads,
            ops_per_thread = self.config.ops_per_thread,
            dispatch = ?self.config.dispatch,
            "workload starting"
        );

        let logs: Vec<WorkerLog> = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.config.threads)
                .map(|t| scope.spawn(move || self.worker(t)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("workload worker panicked"))
                .collect()
        });

        let report = self.check(logs);
        info!(
            presence_ops = report.presence_ops,
            typing_ops = report.typing_ops,
            suppressed = report.suppressed,
            violations = report.violations.len(),
            "workload finished"
        );
        report
    }

    fn worker(&self, thread: usize) -> WorkerLog {
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(thread as u64));
        let users: Vec<UserId> = (0..self.config.users_per_thread)
            .map(|n| Self::owned_user(thread, n))
            .collect();
        let mut log = WorkerLog::default();

        for step in 0..self.config.ops_per_thread {
            let who = &users[rng.gen_range(0..users.len())];

            if !self.rooms.is_empty() && rng.gen_bool(self.config.typing_ratio) {
                let target = &self.rooms[rng.gen_range(0..self.rooms.len())];
                let typing = rng.gen_bool(0.5);
                self.type_once(&mut log, target, who, typing);
            } else {
                self.presence_once(&mut log, &mut rng, who, step);
            }
        }

        debug!(
            thread,
            presence_ops = log.presence_ops,
            typing_ops = log.typing_ops,
            "worker done"
        );
        log
    }

    fn type_once(&self, log: &mut WorkerLog, target: &RoomId, who: &UserId, typing: bool) {
        let slot = (target.clone(), who.clone());
        let was_typing = log.typing.get(&slot).copied().unwrap_or(false);
        log.typing_ops += 1;

        match self.system.typing.set_typing(target, who, typing) {
            Ok(Some(_)) if typing && was_typing => log
                .violations
                .push(format!("{who} restarted typing in {target} and was notified")),
            Ok(None) if !(typing && was_typing) => log
                .violations
                .push(format!("{who} toggled typing in {target} without notification")),
            Ok(None) => log.suppressed += 1,
            Ok(Some(_)) => {}
            Err(err) => log.violations.push(format!("set_typing failed: {err}")),
        }
        log.typing.insert(slot, typing);
    }

    fn presence_once(&self, log: &mut WorkerLog, rng: &mut StdRng, who: &UserId, step: usize) {
        log.presence_ops += 1;

        let result = if rng.gen_bool(0.5) {
            let profile = Profile {
                display_name: Some(format!("{}#{step}", who.localpart())),
                avatar_url: None,
            };
            log.profiles.insert(who.clone(), profile.clone());
            self.system.presence.set_profile(who, profile)
        } else {
            let state = STATES[rng.gen_range(0..STATES.len())];
            let msg = format!("step {step}");
            log.statuses.insert(who.clone(), (state, Some(msg.clone())));
            self.system.presence.update_status(who, Some(state), Some(msg))
        };

        match result {
            Ok(event) => {
                log.last_presence_index.insert(who.clone(), event.index);
            }
            Err(err) => log.violations.push(format!("presence update failed: {err}")),
        }
    }

    fn check(&self, logs: Vec<WorkerLog>) -> WorkloadReport {
        let mut report = WorkloadReport {
            deliveries: self.system.sink.len(),
            ..WorkloadReport::default()
        };
        let mut typing_state: HashMap<(RoomId, UserId), bool> = HashMap::new();
        let mut last_presence_index = HashMap::new();

        for log in logs {
            report.presence_ops += log.presence_ops;
            report.typing_ops += log.typing_ops;
            report.suppressed += log.suppressed;
            report.violations.extend(log.violations);
            typing_state.extend(log.typing);
            last_presence_index.extend(log.last_presence_index);

            for (who, profile) in log.profiles {
                if self.system.presence.profile(&who) != profile {
                    report.violations.push(format!("{who} lost its last profile"));
                }
            }
            for (who, (state, msg)) in log.statuses {
                let status = self.system.presence.status(&who);
                if status.presence != state || status.status_msg != msg {
                    report.violations.push(format!("{who} lost its last status"));
                }
            }
        }

        let deliveries = self.system.sink.deliveries();
        self.check_presence(&mut report, &deliveries, &last_presence_index);
        self.check_typing(&mut report, &deliveries, &typing_state);
        report
    }

    fn check_presence(
        &self,
        report: &mut WorkloadReport,
        deliveries: &[Delivery],
        last_index: &HashMap<UserId, u64>,
    ) {
        let presence = &self.system.presence;
        if presence.max() != report.presence_ops {
            report.violations.push(format!(
                "presence max {} after {} updates",
                presence.max(),
                report.presence_ops
            ));
        }

        let delivered = delivered_indices(deliveries, EventType::Presence);
        self.check_order(report, "presence", &delivered);
        let unique: HashSet<u64> = delivered.iter().copied().collect();
        if unique != (0..presence.max()).collect() {
            report
                .violations
                .push("presence deliveries do not cover 0..max exactly once".into());
        }

        let everyone: HashSet<UserId> = last_index.keys().cloned().collect();
        for event in presence.range(&everyone, 0, presence.max(), None) {
            if last_index.get(&event.event.user_id) != Some(&event.index) {
                report.violations.push(format!(
                    "range reported index {} for {}",
                    event.index, event.event.user_id
                ));
            }
        }
    }

    fn check_typing(
        &self,
        report: &mut WorkloadReport,
        deliveries: &[Delivery],
        state: &HashMap<(RoomId, UserId), bool>,
    ) {
        let typing = &self.system.typing;
        if typing.max() != report.typing_ops {
            report.violations.push(format!(
                "typing max {} after {} toggles",
                typing.max(),
                report.typing_ops
            ));
        }

        let delivered = delivered_indices(deliveries, EventType::Typing);
        self.check_order(report, "typing", &delivered);
        let unique: HashSet<u64> = delivered.iter().copied().collect();
        if unique.len() != delivered.len()
            || delivered.len() as u64 + report.suppressed != typing.max()
            || unique.iter().any(|i| *i >= typing.max())
        {
            report.violations.push(format!(
                "{} typing deliveries and {} suppressed do not account for max {}",
                delivered.len(),
                report.suppressed,
                typing.max()
            ));
        }

        let rooms: HashSet<RoomId> = self.rooms.iter().cloned().collect();
        let hits = typing.range(&rooms, 0, typing.max(), None);
        for target in &self.rooms {
            let expected: HashSet<UserId> = state
                .iter()
                .filter(|((r, _), typing)| r == target && **typing)
                .map(|((_, who), _)| who.clone())
                .collect();
            let actual: HashSet<UserId> = typing.typing(target).into_iter().collect();
            if actual != expected {
                report.violations.push(format!("{target} typing set diverged"));
            }

            let touched = state.keys().any(|(r, _)| r == target);
            let ranged = hits.iter().find(|e| e.event.room_id.as_ref() == Some(target));
            match ranged.map(|e| &e.event.content) {
                Some(Content::Typing(content)) => {
                    let ranged: HashSet<UserId> = content.user_ids.iter().cloned().collect();
                    if ranged != actual {
                        report
                            .violations
                            .push(format!("{target} range content differs from current set"));
                    }
                }
                Some(_) => report
                    .violations
                    .push(format!("{target} range returned non-typing content")),
                None if touched => report
                    .violations
                    .push(format!("{target} missing from full range")),
                None => {}
            }
        }
    }

    fn check_order(&self, report: &mut WorkloadReport, stream: &str, delivered: &[u64]) {
        if self.config.dispatch == DispatchMode::Locked
            && delivered.windows(2).any(|w| w[0] >= w[1])
        {
            report
                .violations
                .push(format!("{stream} deliveries out of index order"));
        }
    }
}

fn delivered_indices(deliveries: &[Delivery], kind: EventType) -> Vec<u64> {
    deliveries
        .iter()
        .filter(|d| d.event.event.event_type() == kind)
        .map(|d| d.event.index)
        .collect()
}
