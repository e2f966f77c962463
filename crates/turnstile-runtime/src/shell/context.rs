//! One interactive process session and its read/write/wait state machine.
//!
//! `Starting -> Running -> Exited -> Closed`; a forced close from `Running`
//! goes straight to `Closed`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::debug;
use turnstile_core::{ContextId, TurnstileError};

use super::buffer::{OutputBuffer, strip_ansi};
use super::paginator::{PageLimits, ShellOutputPage, paginate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellStatus {
    Starting,
    Running,
    Exited,
    Closed,
}

impl ShellStatus {
    pub fn is_live(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

/// Tool-facing reply for `exec_command` and `write_stdin`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellResponse {
    pub context_id: ContextId,
    pub status: ShellStatus,
    pub exit_code: Option<i32>,
    #[serde(flatten)]
    pub page: ShellOutputPage,
}

/// Returned by `close_shell`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSummary {
    pub context_id: ContextId,
    pub was_running: bool,
    /// Buffered characters discarded with the context.
    pub pending_output_chars: usize,
    pub dropped_chars: u64,
    pub exit_code: Option<i32>,
}

/// Listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellInfo {
    pub context_id: ContextId,
    pub command: String,
    pub cwd: PathBuf,
    pub pid: Option<u32>,
    pub status: ShellStatus,
    pub exit_code: Option<i32>,
    pub buffered_chars: usize,
    pub dropped_chars: u64,
    pub created_at: DateTime<Utc>,
    pub idle_secs: u64,
}

struct ContextState {
    buffer: OutputBuffer,
    status: ShellStatus,
    exit_code: Option<i32>,
    /// One-shot wakers of suspended polls, drained on every wake. Senders
    /// whose poll already timed out are pruned before each new one is added.
    waiters: Vec<oneshot::Sender<()>>,
    last_active: Instant,
}

impl ContextState {
    fn wake_all(&mut self) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}

pub struct ShellContext {
    pub id: ContextId,
    pub command: String,
    pub cwd: PathBuf,
    pub pid: Option<u32>,
    pub created_at: DateTime<Utc>,
    state: Mutex<ContextState>,
    /// Queue into the stdin writer task; `None` once closed.
    stdin: Mutex<Option<mpsc::Sender<String>>>,
}

impl ShellContext {
    pub(crate) fn new(
        id: ContextId,
        command: String,
        cwd: PathBuf,
        pid: Option<u32>,
        stdin: Option<mpsc::Sender<String>>,
        max_buffer_chars: usize,
    ) -> Self {
        Self {
            id,
            command,
            cwd,
            pid,
            created_at: Utc::now(),
            state: Mutex::new(ContextState {
                buffer: OutputBuffer::new(max_buffer_chars),
                status: ShellStatus::Starting,
                exit_code: None,
                waiters: Vec::new(),
                last_active: Instant::now(),
            }),
            stdin: Mutex::new(stdin),
        }
    }

    pub fn status(&self) -> ShellStatus {
        self.state.lock().status
    }

    /// Baseline for [`Self::wait_for_output`].
    pub fn total_appended(&self) -> u64 {
        self.state.lock().buffer.total_appended()
    }

    pub fn idle_for(&self) -> Duration {
        self.state.lock().last_active.elapsed()
    }

    pub(crate) fn touch(&self) {
        self.state.lock().last_active = Instant::now();
    }

    // ── Feed side ──────────────────────────────────────────────

    pub(crate) fn mark_running(&self) {
        let mut state = self.state.lock();
        if state.status == ShellStatus::Starting {
            state.status = ShellStatus::Running;
        }
    }

    pub(crate) fn append(&self, text: &str) {
        let mut state = self.state.lock();
        state.buffer.push_str(text);
        state.wake_all();
    }

    /// Record the exit. Returns `false` if the context was already closed.
    pub(crate) fn mark_exited(&self, exit_code: Option<i32>) -> bool {
        let mut state = self.state.lock();
        state.exit_code = exit_code;
        let was_live = state.status.is_live();
        if was_live {
            state.status = ShellStatus::Exited;
            state.last_active = Instant::now();
        }
        state.wake_all();
        was_live
    }

    #[cfg(test)]
    pub(crate) fn waiter_count(&self) -> usize {
        self.state.lock().waiters.len()
    }

    // ── Caller side ────────────────────────────────────────────

    /// Suspend until output advances past `baseline`, the process stops, or
    /// `yield_for` elapses. Returns at once if any of these already holds.
    pub async fn wait_for_output(&self, baseline: u64, yield_for: Duration) {
        let woken = {
            let mut state = self.state.lock();
            if state.buffer.total_appended() > baseline || !state.status.is_live() {
                return;
            }
            state.waiters.retain(|waiter| !waiter.is_closed());
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            rx
        };
        if tokio::time::timeout(yield_for, woken).await.is_err() {
            debug!(context_id = self.id, ?yield_for, "yield elapsed without new output");
        }
    }

    /// Queue `chars` for the stdin writer task. Never waits on the pipe: a
    /// process that stops reading fills the queue and later writes fail.
    pub fn write(&self, chars: &str) -> turnstile_core::Result<()> {
        if !self.status().is_live() {
            return Err(TurnstileError::ShellAlreadyExited {
                context_id: self.id,
            });
        }
        self.touch();
        let write_err = |reason: &str| TurnstileError::ShellWrite {
            context_id: self.id,
            reason: reason.into(),
        };
        let stdin = self.stdin.lock();
        let queue = stdin.as_ref().ok_or_else(|| write_err("stdin is closed"))?;
        queue.try_send(chars.to_string()).map_err(|e| match e {
            TrySendError::Full(_) => write_err("stdin is not being read; write queue is full"),
            TrySendError::Closed(_) => write_err("stdin is closed"),
        })
    }

    /// Current tail-window page. Touches the context.
    pub fn response(&self, limits: PageLimits, strip: bool) -> ShellResponse {
        let mut state = self.state.lock();
        state.last_active = Instant::now();
        let raw = state.buffer.as_str();
        let page = if strip {
            paginate(&strip_ansi(raw), state.buffer.dropped_chars(), limits)
        } else {
            paginate(raw, state.buffer.dropped_chars(), limits)
        };
        ShellResponse {
            context_id: self.id,
            status: state.status,
            exit_code: state.exit_code,
            page,
        }
    }

    pub fn info(&self) -> ShellInfo {
        let state = self.state.lock();
        ShellInfo {
            context_id: self.id,
            command: self.command.clone(),
            cwd: self.cwd.clone(),
            pid: self.pid,
            status: state.status,
            exit_code: state.exit_code,
            buffered_chars: state.buffer.len_chars(),
            dropped_chars: state.buffer.dropped_chars(),
            created_at: self.created_at,
            idle_secs: state.last_active.elapsed().as_secs(),
        }
    }

    /// Move to `Closed`, killing the process group first when `force` is set
    /// and the process is still running. The stdin queue is dropped either way.
    pub(crate) fn close(&self, force: bool) -> CloseSummary {
        let summary = {
            let mut state = self.state.lock();
            let was_running = state.status.is_live();
            if force && was_running {
                if let Some(pid) = self.pid {
                    kill_process_group(pid);
                }
            }
            state.status = ShellStatus::Closed;
            state.wake_all();
            CloseSummary {
                context_id: self.id,
                was_running,
                pending_output_chars: state.buffer.len_chars(),
                dropped_chars: state.buffer.dropped_chars(),
                exit_code: state.exit_code,
            }
        };
        self.stdin.lock().take();
        summary
    }
}

/// SIGKILL the whole process group led by `pid`.
fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // The child was spawned as its own group leader, so pgid == pid.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pid, error = %std::io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached(id: ContextId) -> ShellContext {
        let ctx = ShellContext::new(id, "true".into(), PathBuf::from("/"), None, None, 16);
        ctx.mark_running();
        ctx
    }

    #[tokio::test]
    async fn test_wait_returns_when_output_already_advanced() {
        let ctx = detached(1);
        ctx.append("early");
        let started = Instant::now();
        ctx.wait_for_output(0, Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_wait_wakes_on_append() {
        let ctx = std::sync::Arc::new(detached(1));
        let feeder = std::sync::Arc::clone(&ctx);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            feeder.append("late");
        });
        let started = Instant::now();
        ctx.wait_for_output(0, Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(ctx.response(PageLimits::new(100, 10), true).page.output, "late");
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let ctx = detached(1);
        let started = Instant::now();
        ctx.wait_for_output(0, Duration::from_millis(30)).await;
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_exited_context_rejects_writes_but_keeps_output() {
        let ctx = detached(7);
        ctx.append("\x1b[1mbye\x1b[0m\n");
        assert!(ctx.mark_exited(Some(0)));

        let err = ctx.write("more").unwrap_err();
        assert!(matches!(err, TurnstileError::ShellAlreadyExited { context_id: 7 }));

        let resp = ctx.response(PageLimits::new(100, 10), true);
        assert_eq!(resp.status, ShellStatus::Exited);
        assert_eq!(resp.exit_code, Some(0));
        assert_eq!(resp.page.output, "bye\n");

        let raw = ctx.response(PageLimits::new(100, 10), false);
        assert_eq!(raw.page.output, "\x1b[1mbye\x1b[0m\n");
    }

    #[tokio::test]
    async fn test_close_reports_summary() {
        let ctx = detached(3);
        ctx.append("0123456789abcdefXYZ");
        let summary = ctx.close(false);
        assert!(summary.was_running);
        assert_eq!(summary.pending_output_chars, 16);
        assert_eq!(summary.dropped_chars, 3);
        assert_eq!(ctx.status(), ShellStatus::Closed);
        // Exit after close does not reopen the state machine
        assert!(!ctx.mark_exited(Some(1)));
        assert_eq!(ctx.status(), ShellStatus::Closed);
    }

    #[tokio::test]
    async fn test_silent_polls_do_not_accumulate_waiters() {
        let ctx = detached(4);
        for _ in 0..50 {
            ctx.wait_for_output(0, Duration::from_millis(1)).await;
        }
        // Only the most recent timed-out sender can still be pending
        assert!(ctx.waiter_count() <= 1);
    }

    #[tokio::test]
    async fn test_write_fails_fast_when_queue_is_full() {
        let (tx, _rx) = mpsc::channel(1);
        let ctx = ShellContext::new(5, "cat".into(), PathBuf::from("/"), None, Some(tx), 16);
        ctx.mark_running();
        ctx.write("first").unwrap();
        let err = ctx.write("second").unwrap_err();
        assert!(matches!(err, TurnstileError::ShellWrite { context_id: 5, .. }));

        ctx.close(false);
        let err = ctx.write("third").unwrap_err();
        assert!(matches!(err, TurnstileError::ShellAlreadyExited { context_id: 5 }));
    }

    #[test]
    fn test_reading_pages_leaves_buffer_untouched() {
        let ctx = detached(8);
        ctx.append("0123456789abcdefXYZ");
        let limits = PageLimits::new(4, 10);
        let first = ctx.response(limits, true);
        let second = ctx.response(limits, true);
        assert_eq!(first.page, second.page);
        assert_eq!(first.page.output, "fXYZ");
        assert_eq!(first.page.dropped_chars, 3);
        let info = ctx.info();
        assert_eq!(info.buffered_chars, 16);
        assert_eq!(info.dropped_chars, 3);
    }

    #[test]
    fn test_response_serializes_flat() {
        let ctx = detached(2);
        ctx.append("hi\n");
        let json = serde_json::to_value(ctx.response(PageLimits::new(100, 10), true)).unwrap();
        assert_eq!(json["contextId"], 2);
        assert_eq!(json["status"], "running");
        assert_eq!(json["output"], "hi\n");
        assert_eq!(json["hasMoreOutput"], false);
        assert!(json["exitCode"].is_null());
    }
}
