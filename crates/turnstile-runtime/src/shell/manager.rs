//! Registry of shell contexts and the tasks that feed them.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use turnstile_core::{ContextId, Event, EventBus, TurnstileError};

use super::ShellSettings;
use super::buffer::Utf8StreamDecoder;
use super::context::{CloseSummary, ShellContext, ShellInfo, ShellResponse, ShellStatus};

/// Read chunk size for the stdout/stderr readers.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Process event channel depth; a full channel back-pressures the readers.
const EVENT_CHANNEL_DEPTH: usize = 256;

/// Pending stdin writes per context before `write_stdin` starts failing.
const STDIN_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecCommandParams {
    pub cmd: String,
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default)]
    pub login: bool,
    #[serde(default)]
    pub yield_time_ms: Option<u64>,
    #[serde(default)]
    pub max_output_tokens: Option<usize>,
}

impl ExecCommandParams {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            workdir: None,
            shell: None,
            login: false,
            yield_time_ms: None,
            max_output_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteStdinParams {
    pub context_id: ContextId,
    /// Empty means poll without writing.
    #[serde(default)]
    pub chars: String,
    #[serde(default)]
    pub yield_time_ms: Option<u64>,
    #[serde(default)]
    pub max_output_tokens: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseShellParams {
    pub context_id: ContextId,
    #[serde(default)]
    pub force: bool,
}

enum ProcessEvent {
    Output(String),
    Exited(Option<i32>),
}

struct Registry {
    contexts: HashMap<ContextId, Arc<ShellContext>>,
    next_id: ContextId,
}

struct ManagerInner {
    settings: ShellSettings,
    registry: Mutex<Registry>,
    events: EventBus,
}

impl ManagerInner {
    fn get(&self, context_id: ContextId) -> turnstile_core::Result<Arc<ShellContext>> {
        self.registry
            .lock()
            .contexts
            .get(&context_id)
            .cloned()
            .ok_or(TurnstileError::ShellNotFound { context_id })
    }
}

/// Owns every shell context. Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct ShellSessionManager {
    inner: Arc<ManagerInner>,
}

impl ShellSessionManager {
    pub fn new(settings: ShellSettings) -> Self {
        Self::with_events(settings, EventBus::default())
    }

    pub fn with_events(settings: ShellSettings, events: EventBus) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                settings,
                registry: Mutex::new(Registry {
                    contexts: HashMap::new(),
                    next_id: 1,
                }),
                events,
            }),
        }
    }

    pub fn settings(&self) -> &ShellSettings {
        &self.inner.settings
    }

    /// Spawn `<shell> -c <command>` (or `-lc` for a login shell) in its own
    /// process group and register it.
    pub fn create(
        &self,
        command: &str,
        cwd: Option<&Path>,
        shell: Option<&str>,
        login: bool,
    ) -> turnstile_core::Result<ContextId> {
        let cwd = match cwd {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir()?,
        };
        let spawn_err = |reason: String| TurnstileError::ShellSpawn {
            command: command.to_string(),
            reason,
        };
        if !cwd.is_dir() {
            return Err(spawn_err(format!(
                "working directory does not exist: {}",
                cwd.display()
            )));
        }

        let shell = self.inner.settings.resolve_shell(shell);
        let mut child = Command::new(&shell)
            .arg(if login { "-lc" } else { "-c" })
            .arg(command)
            .current_dir(&cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()
            .map_err(|e| spawn_err(format!("{shell}: {e}")))?;

        let pid = child.id();
        let stdin = child.stdin.take().map(spawn_writer);
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let context = {
            let mut registry = self.inner.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            let context = Arc::new(ShellContext::new(
                id,
                command.to_string(),
                cwd,
                pid,
                stdin,
                self.inner.settings.max_buffer_chars,
            ));
            registry.contexts.insert(id, Arc::clone(&context));
            context
        };

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);
        let mut readers = Vec::with_capacity(2);
        if let Some(out) = stdout {
            readers.push(spawn_reader(out, tx.clone()));
        }
        if let Some(err) = stderr {
            readers.push(spawn_reader(err, tx.clone()));
        }
        tokio::spawn(supervise(child, readers, tx, self.inner.settings.exit_flush));
        tokio::spawn(run_feed(
            Arc::clone(&context),
            rx,
            Arc::downgrade(&self.inner),
        ));
        context.mark_running();

        info!(context_id = context.id, pid = ?pid, shell = %shell, command, "opened shell context");
        self.inner.events.publish(Event::ShellOpened {
            context_id: context.id,
            command: command.to_string(),
            pid,
        });
        Ok(context.id)
    }

    /// Run a command, reusing a live context with the same command and
    /// working directory, and wait a bounded time for its output.
    pub async fn exec_command(
        &self,
        params: ExecCommandParams,
    ) -> turnstile_core::Result<ShellResponse> {
        let cwd = match &params.workdir {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()?,
        };

        let reusable = self
            .inner
            .registry
            .lock()
            .contexts
            .values()
            .filter(|c| c.status().is_live() && c.command == params.cmd && c.cwd == cwd)
            .min_by_key(|c| c.id)
            .cloned();

        let (context, baseline) = match reusable {
            Some(context) => {
                debug!(context_id = context.id, "reusing live shell context");
                let baseline = context.total_appended();
                (context, baseline)
            }
            None => {
                let id = self.create(
                    &params.cmd,
                    Some(&cwd),
                    params.shell.as_deref(),
                    params.login,
                )?;
                (self.inner.get(id)?, 0)
            }
        };

        let settings = &self.inner.settings;
        let yield_for = settings.clamp_yield(params.yield_time_ms, settings.exec_yield);
        context.wait_for_output(baseline, yield_for).await;
        Ok(self.respond(&context, params.max_output_tokens))
    }

    /// Write to a live context's stdin (or just poll when `chars` is empty)
    /// and wait a bounded time for new output.
    pub async fn write_stdin(
        &self,
        params: WriteStdinParams,
    ) -> turnstile_core::Result<ShellResponse> {
        let context = self.inner.get(params.context_id)?;
        if !context.status().is_live() {
            return Err(TurnstileError::ShellAlreadyExited {
                context_id: params.context_id,
            });
        }

        let baseline = context.total_appended();
        if params.chars.is_empty() {
            context.touch();
        } else {
            context.write(&params.chars)?;
        }

        let settings = &self.inner.settings;
        let yield_for = settings.clamp_yield(params.yield_time_ms, settings.write_yield);
        context.wait_for_output(baseline, yield_for).await;
        Ok(self.respond(&context, params.max_output_tokens))
    }

    /// Drop a context from the registry. With `force`, a still-running
    /// process group is killed; otherwise it runs on detached.
    pub async fn close_shell(
        &self,
        params: CloseShellParams,
    ) -> turnstile_core::Result<CloseSummary> {
        let context = self
            .inner
            .registry
            .lock()
            .contexts
            .remove(&params.context_id)
            .ok_or(TurnstileError::ShellNotFound {
                context_id: params.context_id,
            })?;

        let summary = context.close(params.force);
        info!(
            context_id = summary.context_id,
            force = params.force,
            was_running = summary.was_running,
            "closed shell context"
        );
        self.inner.events.publish(Event::ShellClosed {
            context_id: summary.context_id,
            forced: params.force && summary.was_running,
        });
        Ok(summary)
    }

    /// Current page of a registered context without waiting or touching its
    /// stdin. Works on exited contexts too.
    pub fn snapshot(
        &self,
        context_id: ContextId,
        max_output_tokens: Option<usize>,
    ) -> turnstile_core::Result<ShellResponse> {
        let context = self.inner.get(context_id)?;
        Ok(self.respond(&context, max_output_tokens))
    }

    /// All registered contexts, ordered by id.
    pub fn list(&self) -> Vec<ShellInfo> {
        let mut infos: Vec<ShellInfo> = self
            .inner
            .registry
            .lock()
            .contexts
            .values()
            .map(|c| c.info())
            .collect();
        infos.sort_by_key(|i| i.context_id);
        infos
    }

    /// Force-close every context (call on runtime shutdown).
    pub async fn shutdown(&self) -> usize {
        let contexts: Vec<Arc<ShellContext>> = self
            .inner
            .registry
            .lock()
            .contexts
            .drain()
            .map(|(_, c)| c)
            .collect();

        let closed = contexts.len();
        for context in contexts {
            let summary = context.close(true);
            info!(
                context_id = summary.context_id,
                pid = ?context.pid,
                "closed shell context on shutdown"
            );
            self.inner.events.publish(Event::ShellClosed {
                context_id: summary.context_id,
                forced: summary.was_running,
            });
        }
        closed
    }

    fn respond(&self, context: &ShellContext, max_output_tokens: Option<usize>) -> ShellResponse {
        let settings = &self.inner.settings;
        context.response(settings.page_limits(max_output_tokens), settings.strip_ansi)
    }
}

// ─── Per-context tasks ────────────────────────────────────────────────

fn spawn_reader<R>(mut reader: R, tx: mpsc::Sender<ProcessEvent>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut decoder = Utf8StreamDecoder::new();
        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    debug!(error = %e, "shell output reader stopped");
                    break;
                }
            };
            let text = decoder.decode(&buf[..n]);
            if !text.is_empty() && tx.send(ProcessEvent::Output(text)).await.is_err() {
                return;
            }
        }
        let tail = decoder.finish();
        if !tail.is_empty() {
            let _ = tx.send(ProcessEvent::Output(tail)).await;
        }
    })
}

/// Own the child's stdin and write queued chunks in order. Stops when the
/// queue is dropped or the pipe breaks.
fn spawn_writer(mut stdin: ChildStdin) -> mpsc::Sender<String> {
    let (tx, mut rx) = mpsc::channel::<String>(STDIN_QUEUE_DEPTH);
    tokio::spawn(async move {
        while let Some(chars) = rx.recv().await {
            let written = async {
                stdin.write_all(chars.as_bytes()).await?;
                stdin.flush().await
            }
            .await;
            if let Err(e) = written {
                debug!(error = %e, "shell stdin writer stopped");
                return;
            }
        }
    });
    tx
}

/// Reap the child, give the readers up to `exit_flush` to drain, then
/// report the exit.
async fn supervise(
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    tx: mpsc::Sender<ProcessEvent>,
    exit_flush: Duration,
) {
    let exit_code = match child.wait().await {
        Ok(status) => status.code().or_else(|| status.signal().map(|s| 128 + s)),
        Err(e) => {
            warn!(error = %e, "failed to reap shell process");
            None
        }
    };

    let drained = tokio::time::timeout(exit_flush, async {
        for reader in readers {
            let _ = reader.await;
        }
    })
    .await;
    if drained.is_err() {
        debug!(?exit_code, "output still open after exit; marking exited anyway");
    }
    let _ = tx.send(ProcessEvent::Exited(exit_code)).await;
}

/// Apply process events to the context until the exit is reported.
async fn run_feed(
    context: Arc<ShellContext>,
    mut rx: mpsc::Receiver<ProcessEvent>,
    manager: Weak<ManagerInner>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            ProcessEvent::Output(text) => context.append(&text),
            ProcessEvent::Exited(exit_code) => {
                let was_live = context.mark_exited(exit_code);
                info!(context_id = context.id, ?exit_code, "shell process exited");
                let Some(inner) = manager.upgrade() else {
                    return;
                };
                inner.events.publish(Event::ShellExited {
                    context_id: context.id,
                    exit_code,
                });
                if was_live {
                    let grace = inner.settings.cleanup_grace;
                    tokio::spawn(reclaim_when_idle(Arc::downgrade(&inner), context, grace));
                }
                return;
            }
        }
    }
}

/// Remove an exited context once nobody has touched it for `grace`.
async fn reclaim_when_idle(manager: Weak<ManagerInner>, context: Arc<ShellContext>, grace: Duration) {
    loop {
        let idle = context.idle_for();
        if idle < grace {
            tokio::time::sleep(grace - idle).await;
            continue;
        }
        if context.status() == ShellStatus::Closed {
            return;
        }
        let Some(inner) = manager.upgrade() else {
            return;
        };
        let removed = {
            let mut registry = inner.registry.lock();
            let same = registry
                .contexts
                .get(&context.id)
                .is_some_and(|c| Arc::ptr_eq(c, &context));
            same.then(|| registry.contexts.remove(&context.id)).flatten()
        };
        if removed.is_some() {
            info!(context_id = context.id, idle_secs = idle.as_secs(), "reclaimed idle shell context");
            inner.events.publish(Event::ShellReclaimed {
                context_id: context.id,
            });
        }
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn manager() -> ShellSessionManager {
        let settings = ShellSettings {
            default_shell: Some("/bin/sh".into()),
            ..ShellSettings::default()
        };
        ShellSessionManager::new(settings)
    }

    fn exec(cmd: &str, yield_ms: u64) -> ExecCommandParams {
        ExecCommandParams {
            yield_time_ms: Some(yield_ms),
            ..ExecCommandParams::new(cmd)
        }
    }

    async fn wait_until_exited(mgr: &ShellSessionManager, id: ContextId) -> ShellResponse {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let resp = mgr
                .write_stdin(WriteStdinParams {
                    context_id: id,
                    chars: String::new(),
                    yield_time_ms: Some(100),
                    max_output_tokens: None,
                })
                .await;
            match resp {
                Ok(resp) if resp.status == ShellStatus::Exited => return resp,
                Err(TurnstileError::ShellAlreadyExited { .. }) => {
                    return mgr.snapshot(id, None).unwrap();
                }
                _ => {}
            }
            assert!(Instant::now() < deadline, "context {id} did not exit");
        }
    }

    // ── Exec tests ─────────────────────────────────────────────

    #[tokio::test]
    async fn test_exec_echo() {
        let mgr = manager();
        let resp = mgr.exec_command(exec("echo hello_from_shell", 5_000)).await.unwrap();
        assert_eq!(resp.context_id, 1);

        let done = wait_until_exited(&mgr, resp.context_id).await;
        assert_eq!(done.page.output, "hello_from_shell\n");
        assert_eq!(done.exit_code, Some(0));
        assert!(!done.page.has_more_output);
    }

    #[tokio::test]
    async fn test_exec_returns_within_yield() {
        let mgr = manager();
        let started = Instant::now();
        let resp = mgr.exec_command(exec("sleep 5 && echo hi", 100)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(resp.status, ShellStatus::Running);
        assert!(!resp.page.has_more_output);
        assert!(!resp.page.output.contains("hi"));

        mgr.close_shell(CloseShellParams {
            context_id: resp.context_id,
            force: true,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_exec_reuses_live_context() {
        let mgr = manager();
        let first = mgr.exec_command(exec("sleep 5", 10)).await.unwrap();
        let second = mgr.exec_command(exec("sleep 5", 10)).await.unwrap();
        assert_eq!(first.context_id, second.context_id);

        let other = mgr.exec_command(exec("sleep 4", 10)).await.unwrap();
        assert_ne!(other.context_id, first.context_id);
        assert_eq!(mgr.list().len(), 2);
        assert_eq!(mgr.shutdown().await, 2);
        assert!(mgr.list().is_empty());
    }

    #[tokio::test]
    async fn test_exec_stderr_and_exit_code() {
        let mgr = manager();
        let resp = mgr
            .exec_command(exec("echo oops >&2; exit 3", 5_000))
            .await
            .unwrap();
        let done = wait_until_exited(&mgr, resp.context_id).await;
        assert_eq!(done.exit_code, Some(3));
        assert!(done.page.output.contains("oops"));
    }

    #[tokio::test]
    async fn test_exec_missing_workdir_is_spawn_failure() {
        let mgr = manager();
        let mut params = exec("true", 10);
        params.workdir = Some("/definitely/not/here".into());
        let err = mgr.exec_command(params).await.unwrap_err();
        assert_eq!(err.code(), "spawn_failure");
        assert!(mgr.list().is_empty());
    }

    #[tokio::test]
    async fn test_exec_in_workdir() {
        let mgr = manager();
        let dir = tempfile::tempdir().unwrap();
        let mut params = exec("pwd", 5_000);
        params.workdir = Some(dir.path().display().to_string());
        let resp = mgr.exec_command(params).await.unwrap();
        let done = wait_until_exited(&mgr, resp.context_id).await;
        let name = dir.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(done.page.output.contains(&name), "pwd output: {}", done.page.output);
    }

    // ── Stdin tests ────────────────────────────────────────────

    #[tokio::test]
    async fn test_write_stdin_round_trip() {
        let mgr = manager();
        let resp = mgr.exec_command(exec("cat", 10)).await.unwrap();
        let id = resp.context_id;

        let echoed = mgr
            .write_stdin(WriteStdinParams {
                context_id: id,
                chars: "ping\n".into(),
                yield_time_ms: Some(2_000),
                max_output_tokens: None,
            })
            .await
            .unwrap();
        assert_eq!(echoed.status, ShellStatus::Running);
        assert_eq!(echoed.page.output, "ping\n");

        let summary = mgr
            .close_shell(CloseShellParams {
                context_id: id,
                force: true,
            })
            .await
            .unwrap();
        assert!(summary.was_running);
        assert_eq!(summary.pending_output_chars, 5);
    }

    #[tokio::test]
    async fn test_large_write_to_non_reader_returns_within_yield() {
        let mgr = manager();
        let resp = mgr.exec_command(exec("sleep 30", 10)).await.unwrap();
        let id = resp.context_id;
        let pid = mgr.inner.get(id).unwrap().pid.unwrap();

        let write = mgr.write_stdin(WriteStdinParams {
            context_id: id,
            chars: "x".repeat(1_000_000),
            yield_time_ms: Some(100),
            max_output_tokens: None,
        });
        let resp = tokio::time::timeout(Duration::from_secs(3), write)
            .await
            .expect("write_stdin blocked on a full pipe")
            .unwrap();
        assert_eq!(resp.status, ShellStatus::Running);

        // A plain close must not wait for the stuck write either
        let close = mgr.close_shell(CloseShellParams {
            context_id: id,
            force: false,
        });
        let summary = tokio::time::timeout(Duration::from_secs(3), close)
            .await
            .expect("close_shell blocked on stdin")
            .unwrap();
        assert!(summary.was_running);
        unsafe { libc::killpg(pid as i32, libc::SIGKILL) };
    }

    #[tokio::test]
    async fn test_silent_polls_keep_waiters_bounded() {
        let mgr = manager();
        let resp = mgr.exec_command(exec("sleep 30", 10)).await.unwrap();
        let id = resp.context_id;
        for _ in 0..100 {
            mgr.write_stdin(WriteStdinParams {
                context_id: id,
                chars: String::new(),
                yield_time_ms: Some(1),
                max_output_tokens: None,
            })
            .await
            .unwrap();
        }
        assert!(mgr.inner.get(id).unwrap().waiter_count() <= 1);
        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn test_write_stdin_unknown_context() {
        let mgr = manager();
        let err = mgr
            .write_stdin(WriteStdinParams {
                context_id: 42,
                chars: "x".into(),
                yield_time_ms: None,
                max_output_tokens: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TurnstileError::ShellNotFound { context_id: 42 }));
    }

    #[tokio::test]
    async fn test_write_stdin_after_exit() {
        let mgr = manager();
        let resp = mgr.exec_command(exec("true", 5_000)).await.unwrap();
        wait_until_exited(&mgr, resp.context_id).await;

        let err = mgr
            .write_stdin(WriteStdinParams {
                context_id: resp.context_id,
                chars: "late\n".into(),
                yield_time_ms: None,
                max_output_tokens: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "already_exited");
    }

    // ── Close tests ────────────────────────────────────────────

    #[tokio::test]
    async fn test_double_close_is_not_found() {
        let mgr = manager();
        let resp = mgr.exec_command(exec("sleep 5", 10)).await.unwrap();
        let close = CloseShellParams {
            context_id: resp.context_id,
            force: true,
        };
        mgr.close_shell(close.clone()).await.unwrap();
        let err = mgr.close_shell(close).await.unwrap_err();
        assert!(matches!(err, TurnstileError::ShellNotFound { .. }));
    }

    #[tokio::test]
    async fn test_force_close_kills_process_group() {
        let mgr = manager();
        let resp = mgr.exec_command(exec("sleep 30 & sleep 30", 10)).await.unwrap();
        let pid = mgr.inner.get(resp.context_id).unwrap().pid.unwrap();

        mgr.close_shell(CloseShellParams {
            context_id: resp.context_id,
            force: true,
        })
        .await
        .unwrap();

        // The group leader is reaped shortly after SIGKILL
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let alive = unsafe { libc::kill(pid as i32, 0) == 0 };
            if !alive {
                break;
            }
            assert!(Instant::now() < deadline, "shell {pid} survived");
        }
    }

    #[tokio::test]
    async fn test_ids_increase_from_one() {
        let mgr = manager();
        let a = mgr.create("sleep 5", None, None, false).unwrap();
        let b = mgr.create("sleep 5", None, None, false).unwrap();
        assert_eq!((a, b), (1, 2));
        let listed: Vec<_> = mgr.list().iter().map(|i| i.context_id).collect();
        assert_eq!(listed, vec![1, 2]);
        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn test_exited_context_is_reclaimed() {
        let settings = ShellSettings {
            default_shell: Some("/bin/sh".into()),
            cleanup_grace: Duration::from_millis(100),
            ..ShellSettings::default()
        };
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let mgr = ShellSessionManager::with_events(settings, events);
        let id = mgr.create("true", None, None, false).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !mgr.list().is_empty() {
            assert!(Instant::now() < deadline, "context was never reclaimed");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let mut reclaimed = false;
        while let Ok(event) = rx.try_recv() {
            if let Event::ShellReclaimed { context_id } = event {
                assert_eq!(context_id, id);
                reclaimed = true;
            }
        }
        assert!(reclaimed);
    }
}
