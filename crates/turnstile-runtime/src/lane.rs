//! Per-identity lanes: the pending queue and single-turn execution state for
//! one [`ChatKey`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Instant;
use tokio::sync::oneshot;
use turnstile_core::{ChatKey, ExecutionFailure, FailureKind, JobId, JobPayload};
use uuid::Uuid;

/// One admitted unit of work. Owned by its lane until settled.
#[derive(Debug)]
pub struct Job<O> {
    pub id: JobId,
    pub chat_key: ChatKey,
    pub payload: JobPayload,
    pub enqueued_at: Instant,
    pub submitted_at: DateTime<Utc>,
    /// Admission sequence number, strictly increasing across the scheduler.
    pub(crate) seq: u64,
    settle: oneshot::Sender<Settlement<O>>,
}

impl<O> Job<O> {
    pub(crate) fn new(
        seq: u64,
        chat_key: ChatKey,
        payload: JobPayload,
        settle: oneshot::Sender<Settlement<O>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_key,
            payload,
            enqueued_at: Instant::now(),
            submitted_at: Utc::now(),
            seq,
            settle,
        }
    }

    /// The read-only view handed to the execution unit.
    pub(crate) fn view(&self) -> TurnJob {
        TurnJob {
            id: self.id,
            payload: self.payload.clone(),
            submitted_at: self.submitted_at,
        }
    }

    pub(crate) fn settle(self, outcome: JobOutcome<O>, folded: Vec<JobId>, rounds: u32) {
        let settlement = Settlement {
            job_id: self.id,
            outcome,
            folded,
            rounds,
        };
        // The requester may have stopped listening.
        let _ = self.settle.send(settlement);
    }

    pub(crate) fn cancel(self) {
        let id = self.id;
        self.settle(JobOutcome::Cancelled, vec![id], 0);
    }
}

/// A job as seen by the execution unit.
#[derive(Debug, Clone, Serialize)]
pub struct TurnJob {
    pub id: JobId,
    pub payload: JobPayload,
    pub submitted_at: DateTime<Utc>,
}

/// What the execution unit runs: round 0 carries the job that opened the
/// turn, later rounds carry the corrections that arrived while the previous
/// round ran.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub chat_key: ChatKey,
    pub round: u32,
    pub jobs: Vec<TurnJob>,
}

impl Turn {
    pub(crate) fn new(chat_key: ChatKey, round: u32, jobs: Vec<TurnJob>) -> Self {
        Self {
            chat_key,
            round,
            jobs,
        }
    }

    /// Whether this round is a merged follow-up rather than the opening job.
    pub fn is_correction(&self) -> bool {
        self.round > 0
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.jobs.iter().map(|j| j.id).collect()
    }

    /// All payload texts of this round, oldest first, one per line.
    pub fn combined_text(&self) -> String {
        self.jobs
            .iter()
            .map(|j| j.payload.text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Final result of a job, as reported to its requester.
#[derive(Debug, Clone)]
pub enum JobOutcome<O> {
    Completed(O),
    Failed(ExecutionFailure),
    /// Withdrawn before dispatch.
    Cancelled,
}

impl<O> JobOutcome<O> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn output(&self) -> Option<&O> {
        match self {
            Self::Completed(output) => Some(output),
            _ => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failed(failure) => Some(failure.kind),
            _ => None,
        }
    }
}

impl<O> From<Result<O, ExecutionFailure>> for JobOutcome<O> {
    fn from(result: Result<O, ExecutionFailure>) -> Self {
        match result {
            Ok(output) => Self::Completed(output),
            Err(failure) => Self::Failed(failure),
        }
    }
}

/// The single settle notification a requester receives for its job.
#[derive(Debug, Clone)]
pub struct Settlement<O> {
    pub job_id: JobId,
    pub outcome: JobOutcome<O>,
    /// Every job whose reply is this outcome, in arrival order. Contains only
    /// `job_id` unless corrections were merged into the turn.
    pub folded: Vec<JobId>,
    /// Correction rounds the turn used.
    pub rounds: u32,
}

impl<O> Settlement<O> {
    pub fn was_merged(&self) -> bool {
        self.folded.len() > 1
    }
}

#[derive(Debug)]
struct RunningTurn {
    job_id: JobId,
    /// Jobs admitted with `seq >= turn_started_seq` arrived while the turn ran.
    turn_started_seq: u64,
}

/// Queue plus execution state for one chat key.
#[derive(Debug)]
pub(crate) struct Lane<O> {
    pending: VecDeque<Job<O>>,
    running: Option<RunningTurn>,
    correction_rounds_used: u32,
    last_active: Instant,
    /// Whether this lane currently sits in the scheduler's ready queue.
    pub(crate) ready: bool,
}

impl<O> Lane<O> {
    pub(crate) fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            running: None,
            correction_rounds_used: 0,
            last_active: Instant::now(),
            ready: false,
        }
    }

    /// Append a job and return its 1-based position in the pending queue.
    pub(crate) fn push(&mut self, job: Job<O>) -> usize {
        self.pending.push_back(job);
        self.last_active = Instant::now();
        self.pending.len()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Position of a job: 0 when it is the running turn's opening job,
    /// otherwise its 1-based place in the pending queue.
    pub(crate) fn position_of(&self, job_id: JobId) -> Option<usize> {
        if self.running.as_ref().is_some_and(|r| r.job_id == job_id) {
            return Some(0);
        }
        self.pending
            .iter()
            .position(|j| j.id == job_id)
            .map(|idx| idx + 1)
    }

    /// Dequeue the next job and mark the lane running. `next_seq` is the
    /// sequence number the next admitted job will receive.
    pub(crate) fn start_next(&mut self, next_seq: u64) -> Option<Job<O>> {
        if self.running.is_some() {
            return None;
        }
        let job = self.pending.pop_front()?;
        self.running = Some(RunningTurn {
            job_id: job.id,
            turn_started_seq: next_seq,
        });
        self.correction_rounds_used = 0;
        self.last_active = Instant::now();
        Some(job)
    }

    /// Drain up to `max` jobs that arrived while the turn was running and
    /// begin a new round with them. Jobs admitted before the turn began are
    /// left in place.
    pub(crate) fn take_corrections(&mut self, max: usize) -> Vec<Job<O>> {
        let Some(running) = self.running.as_ref() else {
            return Vec::new();
        };
        let mut taken = Vec::new();
        while taken.len() < max {
            let arrived_during_turn = self
                .pending
                .front()
                .is_some_and(|job| job.seq >= running.turn_started_seq);
            if !arrived_during_turn {
                break;
            }
            if let Some(job) = self.pending.pop_front() {
                taken.push(job);
            }
        }
        if !taken.is_empty() {
            self.correction_rounds_used += 1;
            self.last_active = Instant::now();
        }
        taken
    }

    pub(crate) fn correction_rounds_used(&self) -> u32 {
        self.correction_rounds_used
    }

    /// Mark the running turn finished.
    pub(crate) fn finish(&mut self) {
        self.running = None;
        self.correction_rounds_used = 0;
        self.last_active = Instant::now();
    }

    /// Withdraw a pending job.
    pub(crate) fn remove(&mut self, job_id: JobId) -> Option<Job<O>> {
        let idx = self.pending.iter().position(|j| j.id == job_id)?;
        self.last_active = Instant::now();
        self.pending.remove(idx)
    }

    /// Idle (empty and not running) for at least `idle_for`.
    pub(crate) fn is_idle_for(&self, idle_for: std::time::Duration) -> bool {
        self.running.is_none() && self.pending.is_empty() && self.last_active.elapsed() >= idle_for
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(seq: u64) -> (Job<()>, oneshot::Receiver<Settlement<()>>) {
        let (tx, rx) = oneshot::channel();
        (
            Job::new(seq, ChatKey::new("u1"), JobPayload::api(format!("m{seq}")), tx),
            rx,
        )
    }

    #[test]
    fn test_lane_fifo_positions() {
        let mut lane = Lane::new();
        let (a, _ra) = job(0);
        let (b, _rb) = job(1);
        let (a_id, b_id) = (a.id, b.id);
        assert_eq!(lane.push(a), 1);
        assert_eq!(lane.push(b), 2);

        let started = lane.start_next(2).unwrap();
        assert_eq!(started.id, a_id);
        assert_eq!(lane.position_of(a_id), Some(0));
        assert_eq!(lane.position_of(b_id), Some(1));
        // Only one running turn at a time
        assert!(lane.start_next(2).is_none());
    }

    #[test]
    fn test_take_corrections_skips_jobs_admitted_before_turn() {
        let mut lane = Lane::new();
        let (a, _ra) = job(0);
        let (b, _rb) = job(1);
        lane.push(a);
        lane.push(b);
        // Turn started when next_seq was 2, so b (seq 1) predates it.
        lane.start_next(2).unwrap();
        assert!(lane.take_corrections(5).is_empty());
        assert_eq!(lane.pending_len(), 1);
    }

    #[test]
    fn test_take_corrections_respects_batch_limit() {
        let mut lane = Lane::new();
        let (a, _ra) = job(0);
        lane.push(a);
        lane.start_next(1).unwrap();

        let mut receivers = Vec::new();
        for seq in 1..=4 {
            let (j, rx) = job(seq);
            receivers.push(rx);
            lane.push(j);
        }
        let taken = lane.take_corrections(3);
        assert_eq!(taken.iter().map(|j| j.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(lane.correction_rounds_used(), 1);

        // The overflow still arrived during the turn, so the next round takes it.
        let taken = lane.take_corrections(3);
        assert_eq!(taken.iter().map(|j| j.seq).collect::<Vec<_>>(), vec![4]);
        assert_eq!(lane.correction_rounds_used(), 2);
        assert_eq!(lane.pending_len(), 0);
    }

    #[test]
    fn test_cancel_sends_cancelled_settlement() {
        let mut lane = Lane::new();
        let (a, mut rx) = job(0);
        let id = a.id;
        lane.push(a);
        lane.remove(id).unwrap().cancel();

        let settlement = rx.try_recv().unwrap();
        assert_eq!(settlement.job_id, id);
        assert!(matches!(settlement.outcome, JobOutcome::Cancelled));
        assert!(!settlement.was_merged());
        assert!(lane.remove(id).is_none());
    }

    #[test]
    fn test_turn_combined_text() {
        let (a, _ra) = job(0);
        let (b, _rb) = job(1);
        let turn = Turn::new(ChatKey::new("u1"), 1, vec![a.view(), b.view()]);
        assert!(turn.is_correction());
        assert_eq!(turn.combined_text(), "m0\nm1");
        assert_eq!(turn.job_ids(), vec![a.id, b.id]);
    }
}
