//! # turnstile-core
//!
//! Core types, traits, and primitives shared by the Turnstile lane scheduler
//! and shell session manager. This crate defines the vocabulary used by every
//! other crate in the workspace.

pub mod error;
pub mod event;
pub mod job;
pub mod tool;
pub mod types;

pub use error::{ExecutionFailure, FailureKind, Result, TurnstileError};
pub use event::{Event, EventBus};
pub use job::JobPayload;
pub use tool::{Tool, ToolCall, ToolExecutor, ToolResult};
pub use types::*;
