use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::FailureKind;

/// Lifecycle events published by the scheduler and the shell manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    // ── Lane lifecycle ─────────────────────────────────────────
    JobQueued {
        chat_key: String,
        job_id: Uuid,
        lane_position: usize,
    },
    TurnStarted {
        chat_key: String,
        job_id: Uuid,
    },
    CorrectionMerged {
        chat_key: String,
        round: u32,
        job_ids: Vec<Uuid>,
    },
    TurnSettled {
        chat_key: String,
        job_ids: Vec<Uuid>,
        rounds: u32,
        /// `None` when the final round succeeded.
        failure: Option<FailureKind>,
    },
    JobCancelled {
        chat_key: String,
        job_id: Uuid,
    },

    // ── Shell lifecycle ────────────────────────────────────────
    ShellOpened {
        context_id: u32,
        command: String,
        pid: Option<u32>,
    },
    ShellExited {
        context_id: u32,
        exit_code: Option<i32>,
    },
    ShellClosed {
        context_id: u32,
        forced: bool,
    },
    ShellReclaimed {
        context_id: u32,
    },

    // ── System ─────────────────────────────────────────────────
    Shutdown,
}

/// A broadcast-based event bus for system-wide pub/sub.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<Event>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn publish(&self, event: Event) {
        // Ignore send errors (no subscribers).
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}
