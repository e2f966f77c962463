use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the Turnstile runtime.
#[derive(Error, Debug)]
pub enum TurnstileError {
    // ── Shell errors ───────────────────────────────────────────
    #[error("shell context {context_id} not found")]
    ShellNotFound { context_id: u32 },

    #[error("shell context {context_id} has already exited")]
    ShellAlreadyExited { context_id: u32 },

    #[error("failed to spawn `{command}`: {reason}")]
    ShellSpawn { command: String, reason: String },

    #[error("failed to write to shell context {context_id}: {reason}")]
    ShellWrite { context_id: u32, reason: String },

    // ── Tool errors ────────────────────────────────────────────
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidToolArguments { tool: String, reason: String },

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl TurnstileError {
    /// Stable machine-readable code, used in tool results.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ShellNotFound { .. } => "not_found",
            Self::ShellAlreadyExited { .. } => "already_exited",
            Self::ShellSpawn { .. } => "spawn_failure",
            Self::ShellWrite { .. } => "write_failure",
            Self::ToolNotFound(_) => "tool_not_found",
            Self::InvalidToolArguments { .. } => "invalid_arguments",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, TurnstileError>;

/// Why a job's execution did not produce an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The execution unit returned an error.
    Error,
    /// The round exceeded the configured job timeout and was aborted.
    TimedOut,
    /// The execution unit panicked.
    Panicked,
}

/// Opaque failure of a job's execution. The scheduler only uses it to free
/// the running slot; the cause is passed through to the requester.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("execution {kind:?}: {reason}")]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl ExecutionFailure {
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Error,
            reason: reason.into(),
        }
    }

    pub fn timed_out(after: std::time::Duration) -> Self {
        Self {
            kind: FailureKind::TimedOut,
            reason: format!("timed out after {}ms", after.as_millis()),
        }
    }

    pub fn panicked(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Panicked,
            reason: reason.into(),
        }
    }
}

impl From<TurnstileError> for ExecutionFailure {
    fn from(err: TurnstileError) -> Self {
        Self::error(err.to_string())
    }
}
