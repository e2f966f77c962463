//! # turnstile-config
//!
//! Configuration system for the Turnstile runtime. Reads from `turnstile.toml`
//! and environment variables, in that precedence order.
//!
//! Supports explicit reload so settings can be re-applied to a live scheduler.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::TurnstileConfig;
pub use schema::{ConfigWarning, LanesConfig, LoggingConfig, ShellConfig, WarningSeverity};
