//! # turnstile-runtime
//!
//! The two concurrency primitives of an agent runtime: the lane scheduler
//! decides *when* a conversational turn runs, and the shell session manager
//! decides *how* a tool call inside that turn converses with a long-lived
//! child process.
//!
//! ## Architecture
//!
//! ```text
//!   Channels / API / Scheduler
//!              │ enqueue(chat_key, payload)
//!              ▼
//!      ┌───────────────┐
//!      │ LaneScheduler │  ← one lane per chat key, global concurrency bound
//!      └───────┬───────┘
//!              │ Turn (round 0 + merged corrections)
//!              ▼
//!      ┌───────────────┐
//!      │ TurnExecutor  │  ← LLM loop, supplied by the embedder
//!      └───────┬───────┘
//!              │ ToolCall
//!              ▼
//!      ┌───────────────┐      ┌──────────────┐
//!      │  ShellTools   │ ───▶ │ ShellSession │ ──▶ child processes
//!      └───────────────┘      │   Manager    │
//!                             └──────────────┘
//! ```

pub mod lane;
pub mod scheduler;
pub mod shell;

pub use lane::{JobOutcome, Settlement, Turn, TurnJob};
pub use scheduler::{Enqueued, LaneScheduler, LaneSettings, SchedulerStats, TurnExecutor};
pub use shell::{
    CloseShellParams, CloseSummary, ExecCommandParams, ShellInfo, ShellResponse,
    ShellSessionManager, ShellSettings, ShellStatus, ShellTools, WriteStdinParams,
};
