//! # Lane Scheduler
//!
//! Admits jobs per chat key, runs at most one turn per key, and bounds the
//! number of keys running at once. Messages that arrive while a key's turn is
//! running are folded into a bounded number of follow-up rounds of that same
//! turn, so a burst of quick corrections yields one coherent reply.
//!
//! ```text
//!  enqueue(key, payload) ──▶ Lane[key].pending ──▶ ready queue
//!                                                     │ dispatch (≤ max_concurrency)
//!                                                     ▼
//!                                     ┌──────── run_turn ────────┐
//!                                     │ round 0: opening job     │
//!                                     │ round n: merged arrivals │ ≤ correction_max_rounds
//!                                     └────────────┬─────────────┘
//!                                                  ▼
//!                                  settle every folded job, free the slot
//! ```
//!
//! `enqueue` never blocks: scheduler state sits behind a synchronous mutex
//! that is never held across an await point.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use turnstile_config::LanesConfig;
use turnstile_core::{ChatKey, Event, EventBus, ExecutionFailure, JobId, JobPayload};

use crate::lane::{Job, JobOutcome, Lane, Settlement, Turn};

/// The execution unit the scheduler drives. It may take arbitrary time; the
/// scheduler cannot cancel it mid-flight unless a job timeout is configured.
#[async_trait]
pub trait TurnExecutor: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    async fn execute(&self, turn: Turn) -> Result<Self::Output, ExecutionFailure>;
}

/// Runtime scheduling knobs, usually derived from [`LanesConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneSettings {
    pub max_concurrency: usize,
    pub enable_correction_merge: bool,
    pub correction_max_rounds: u32,
    pub correction_max_merged_messages: usize,
    /// Abort and fail a round that runs longer than this.
    pub job_timeout: Option<Duration>,
}

impl From<&LanesConfig> for LaneSettings {
    fn from(config: &LanesConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency.max(1),
            enable_correction_merge: config.enable_correction_merge,
            correction_max_rounds: config.correction_max_rounds,
            correction_max_merged_messages: config.correction_max_merged_messages,
            job_timeout: (config.job_timeout_secs > 0)
                .then(|| Duration::from_secs(config.job_timeout_secs)),
        }
    }
}

impl Default for LaneSettings {
    fn default() -> Self {
        Self::from(&LanesConfig::default())
    }
}

/// Admission receipt returned by [`LaneScheduler::enqueue`].
#[derive(Debug)]
pub struct Enqueued<O> {
    pub job_id: JobId,
    /// 0 if the job is already running, else its 1-based place in the lane.
    pub lane_position: usize,
    pub lane_pending: usize,
    pub pending_total: usize,
    /// Resolves exactly once, when the job settles or is cancelled.
    pub settlement: oneshot::Receiver<Settlement<O>>,
}

/// Read-only snapshot of scheduler load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub lanes: usize,
    pub pending_total: usize,
    pub running_total: usize,
    pub pending_by_channel: BTreeMap<String, usize>,
}

struct SchedulerState<O> {
    lanes: HashMap<ChatKey, Lane<O>>,
    /// Lanes with pending work, in the order they became eligible.
    ready: VecDeque<ChatKey>,
    running: usize,
    next_seq: u64,
}

impl<O> SchedulerState<O> {
    fn pending_total(&self) -> usize {
        self.lanes.values().map(Lane::pending_len).sum()
    }

    fn mark_ready(&mut self, chat_key: &ChatKey) {
        if let Some(lane) = self.lanes.get_mut(chat_key) {
            if !lane.ready && !lane.is_running() && lane.has_pending() {
                lane.ready = true;
                self.ready.push_back(chat_key.clone());
            }
        }
    }
}

struct Inner<E: TurnExecutor> {
    executor: Arc<E>,
    settings: RwLock<LaneSettings>,
    state: Mutex<SchedulerState<E::Output>>,
    events: EventBus,
}

/// Per-key serializing scheduler with a global concurrency ceiling.
///
/// Must be used from within a Tokio runtime: dispatch spawns one task per
/// running turn.
pub struct LaneScheduler<E: TurnExecutor> {
    inner: Arc<Inner<E>>,
}

impl<E: TurnExecutor> Clone for LaneScheduler<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: TurnExecutor> LaneScheduler<E> {
    pub fn new(executor: E, settings: LaneSettings) -> Self {
        Self::with_events(executor, settings, EventBus::default())
    }

    pub fn with_events(executor: E, settings: LaneSettings, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor: Arc::new(executor),
                settings: RwLock::new(settings),
                state: Mutex::new(SchedulerState {
                    lanes: HashMap::new(),
                    ready: VecDeque::new(),
                    running: 0,
                    next_seq: 0,
                }),
                events,
            }),
        }
    }

    /// Admit a job. Never blocks and never fails; starts the lane right away
    /// when it is idle and a slot is free.
    pub fn enqueue(
        &self,
        chat_key: impl Into<ChatKey>,
        payload: JobPayload,
    ) -> Enqueued<E::Output> {
        let chat_key = chat_key.into();
        let (tx, rx) = oneshot::channel();
        let origin = payload.origin();

        let (job_id, lane_position, lane_pending, pending_total) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let seq = state.next_seq;
            state.next_seq += 1;

            let job = Job::new(seq, chat_key.clone(), payload, tx);
            let job_id = job.id;
            state
                .lanes
                .entry(chat_key.clone())
                .or_insert_with(Lane::new)
                .push(job);
            state.mark_ready(&chat_key);
            self.inner.dispatch(state);

            let (lane_position, lane_pending) = state
                .lanes
                .get(&chat_key)
                .map(|lane| (lane.position_of(job_id).unwrap_or(0), lane.pending_len()))
                .unwrap_or((0, 0));
            (job_id, lane_position, lane_pending, state.pending_total())
        };

        debug!(
            chat_key = %chat_key,
            job_id = %job_id,
            origin,
            lane_position,
            pending_total,
            "job admitted"
        );
        self.inner.events.publish(Event::JobQueued {
            chat_key: chat_key.to_string(),
            job_id,
            lane_position,
        });

        Enqueued {
            job_id,
            lane_position,
            lane_pending,
            pending_total,
            settlement: rx,
        }
    }

    /// Withdraw a job that has not started yet. Returns `false` if the job is
    /// unknown, already running, or already settled.
    pub fn cancel(&self, chat_key: &ChatKey, job_id: JobId) -> bool {
        let job = self
            .inner
            .state
            .lock()
            .lanes
            .get_mut(chat_key)
            .and_then(|lane| lane.remove(job_id));

        match job {
            Some(job) => {
                info!(chat_key = %chat_key, job_id = %job_id, "pending job cancelled");
                self.inner.events.publish(Event::JobCancelled {
                    chat_key: chat_key.to_string(),
                    job_id,
                });
                job.cancel();
                true
            }
            None => false,
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        let state = self.inner.state.lock();
        let mut pending_by_channel = BTreeMap::new();
        for (key, lane) in &state.lanes {
            if lane.has_pending() {
                *pending_by_channel.entry(key.channel().to_string()).or_insert(0) +=
                    lane.pending_len();
            }
        }
        SchedulerStats {
            lanes: state.lanes.len(),
            pending_total: state.pending_total(),
            running_total: state.running,
            pending_by_channel,
        }
    }

    pub fn settings(&self) -> LaneSettings {
        self.inner.settings.read().clone()
    }

    /// Replace the scheduling settings. A raised concurrency ceiling takes
    /// effect immediately; merge settings apply from the next round boundary.
    pub fn update_settings(&self, settings: LaneSettings) {
        info!(
            max_concurrency = settings.max_concurrency,
            correction_merge = settings.enable_correction_merge,
            "lane settings updated"
        );
        *self.inner.settings.write() = settings;
        let mut guard = self.inner.state.lock();
        self.inner.dispatch(&mut guard);
    }

    /// Drop lanes that have been empty and idle for at least `idle_for`.
    pub fn prune_idle(&self, idle_for: Duration) -> usize {
        let mut state = self.inner.state.lock();
        let before = state.lanes.len();
        state
            .lanes
            .retain(|_, lane| lane.ready || !lane.is_idle_for(idle_for));
        let pruned = before - state.lanes.len();
        if pruned > 0 {
            debug!(pruned, "pruned idle lanes");
        }
        pruned
    }
}

impl<E: TurnExecutor> Inner<E> {
    /// Start one turn per eligible lane until the concurrency ceiling is hit.
    fn dispatch(self: &Arc<Self>, state: &mut SchedulerState<E::Output>) {
        let max_concurrency = self.settings.read().max_concurrency;
        while state.running < max_concurrency {
            let Some(chat_key) = state.ready.pop_front() else {
                break;
            };
            let next_seq = state.next_seq;
            let Some(lane) = state.lanes.get_mut(&chat_key) else {
                continue;
            };
            lane.ready = false;
            // Cancelled jobs can leave an empty lane in the ready queue.
            let Some(job) = lane.start_next(next_seq) else {
                continue;
            };
            state.running += 1;
            debug!(chat_key = %chat_key, running = state.running, "dispatching turn");

            let inner = Arc::clone(self);
            tokio::spawn(async move { inner.run_turn(chat_key, job).await });
        }
    }

    async fn run_turn(self: Arc<Self>, chat_key: ChatKey, opening: Job<E::Output>) {
        info!(
            chat_key = %chat_key,
            job_id = %opening.id,
            origin = opening.payload.origin(),
            "turn started"
        );
        self.events.publish(Event::TurnStarted {
            chat_key: chat_key.to_string(),
            job_id: opening.id,
        });

        let mut turn = Turn::new(chat_key.clone(), 0, vec![opening.view()]);
        let mut members = vec![opening];
        let mut rounds = 0;

        let result = loop {
            let result = self.execute_round(turn).await;

            // Settings are read once per round boundary.
            let settings = self.settings.read().clone();
            let corrections = if settings.enable_correction_merge {
                let mut state = self.state.lock();
                match state.lanes.get_mut(&chat_key) {
                    Some(lane) if lane.correction_rounds_used() < settings.correction_max_rounds => {
                        lane.take_corrections(settings.correction_max_merged_messages)
                    }
                    _ => Vec::new(),
                }
            } else {
                Vec::new()
            };

            if corrections.is_empty() {
                break result;
            }

            rounds += 1;
            if let Err(failure) = &result {
                warn!(chat_key = %chat_key, round = rounds - 1, error = %failure, "round failed; continuing with merged corrections");
            }
            let job_ids: Vec<JobId> = corrections.iter().map(|j| j.id).collect();
            info!(
                chat_key = %chat_key,
                round = rounds,
                merged = job_ids.len(),
                "merging corrections into follow-up round"
            );
            self.events.publish(Event::CorrectionMerged {
                chat_key: chat_key.to_string(),
                round: rounds,
                job_ids,
            });
            turn = Turn::new(
                chat_key.clone(),
                rounds,
                corrections.iter().map(Job::view).collect(),
            );
            members.extend(corrections);
        };

        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.running = state.running.saturating_sub(1);
            if let Some(lane) = state.lanes.get_mut(&chat_key) {
                lane.finish();
            }
            state.mark_ready(&chat_key);
            self.dispatch(state);
        }

        let outcome = JobOutcome::from(result);
        let folded: Vec<JobId> = members.iter().map(|j| j.id).collect();
        match outcome.failure_kind() {
            None => info!(chat_key = %chat_key, jobs = folded.len(), rounds, "turn settled"),
            Some(kind) => warn!(chat_key = %chat_key, jobs = folded.len(), rounds, ?kind, "turn failed"),
        }
        self.events.publish(Event::TurnSettled {
            chat_key: chat_key.to_string(),
            job_ids: folded.clone(),
            rounds,
            failure: outcome.failure_kind(),
        });
        for job in members {
            job.settle(outcome.clone(), folded.clone(), rounds);
        }
    }

    /// Run one round on its own task so a panicking executor cannot wedge
    /// the lane.
    async fn execute_round(&self, turn: Turn) -> Result<E::Output, ExecutionFailure> {
        let executor = Arc::clone(&self.executor);
        let timeout = self.settings.read().job_timeout;
        let mut handle = tokio::spawn(async move { executor.execute(turn).await });

        let joined = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    return Err(ExecutionFailure::timed_out(limit));
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                let payload = e.into_panic();
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "execution unit panicked".into());
                Err(ExecutionFailure::panicked(reason))
            }
            Err(e) => Err(ExecutionFailure::error(format!("execution task cancelled: {e}"))),
        }
    }
}
