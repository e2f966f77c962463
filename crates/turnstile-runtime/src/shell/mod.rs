//! # Shell Session Manager
//!
//! Lets one tool call drive a long-lived child process across several
//! bounded exchanges. Each process gets a [`context::ShellContext`] with a
//! bounded output buffer; callers read tail-window pages of it through the
//! [`paginator`] and never block longer than their yield budget.
//!
//! ## Architecture
//!
//! Per context:
//! - **Readers**: one task each for stdout and stderr, decoding UTF-8
//!   incrementally and forwarding text on the process event channel
//! - **Supervisor**: reaps the child, gives the readers a short flush window,
//!   then reports the exit
//! - **Feed**: applies process events to the context and wakes waiters
//! - **Writer**: owns the child's stdin and drains a bounded queue of
//!   writes, so callers never wait on a pipe the process is not reading
//! - **Cleanup timer**: armed on exit, reclaims the context once idle

pub mod buffer;
pub mod context;
pub mod manager;
pub mod paginator;
pub mod tools;

pub use buffer::{OutputBuffer, Utf8StreamDecoder, strip_ansi};
pub use context::{CloseSummary, ShellInfo, ShellResponse, ShellStatus};
pub use manager::{CloseShellParams, ExecCommandParams, ShellSessionManager, WriteStdinParams};
pub use paginator::{PageLimits, ShellOutputPage, paginate};
pub use tools::ShellTools;

use std::time::Duration;
use turnstile_config::ShellConfig;

/// Fallback when neither the config nor `$SHELL` names a shell.
const FALLBACK_SHELL: &str = "/bin/sh";

/// Runtime shell knobs, usually derived from [`ShellConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSettings {
    pub default_shell: Option<String>,
    pub max_buffer_chars: usize,
    pub default_max_output_tokens: usize,
    pub max_page_lines: usize,
    pub exec_yield: Duration,
    pub write_yield: Duration,
    pub min_yield: Duration,
    pub max_yield: Duration,
    pub exit_flush: Duration,
    pub cleanup_grace: Duration,
    pub strip_ansi: bool,
}

impl From<&ShellConfig> for ShellSettings {
    fn from(config: &ShellConfig) -> Self {
        Self {
            default_shell: config.default_shell.clone(),
            max_buffer_chars: config.max_buffer_chars.max(1),
            default_max_output_tokens: config.default_max_output_tokens,
            max_page_lines: config.max_page_lines,
            exec_yield: Duration::from_millis(config.exec_yield_ms),
            write_yield: Duration::from_millis(config.write_yield_ms),
            min_yield: Duration::from_millis(config.min_yield_ms),
            max_yield: Duration::from_millis(config.max_yield_ms.max(config.min_yield_ms)),
            exit_flush: Duration::from_millis(config.exit_flush_ms),
            cleanup_grace: Duration::from_secs(config.cleanup_grace_secs),
            strip_ansi: config.strip_ansi,
        }
    }
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self::from(&ShellConfig::default())
    }
}

impl ShellSettings {
    /// Requested yield in milliseconds, or `default`, clamped to the
    /// configured bounds.
    pub fn clamp_yield(&self, requested_ms: Option<u64>, default: Duration) -> Duration {
        requested_ms
            .map(Duration::from_millis)
            .unwrap_or(default)
            .clamp(self.min_yield, self.max_yield)
    }

    /// Page bounds for a read. The line cap grows with the budget when the
    /// caller asks for more than the default tokens, and never shrinks below
    /// `max_page_lines`.
    pub fn page_limits(&self, max_output_tokens: Option<usize>) -> PageLimits {
        let tokens = max_output_tokens.unwrap_or(self.default_max_output_tokens);
        let scaled = self
            .max_page_lines
            .saturating_mul(tokens)
            .checked_div(self.default_max_output_tokens)
            .unwrap_or(self.max_page_lines);
        PageLimits::from_tokens(tokens, scaled.max(self.max_page_lines))
    }

    /// Shell to run: explicit request > configured default > `$SHELL` > `/bin/sh`.
    pub fn resolve_shell(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_string)
            .or_else(|| self.default_shell.clone())
            .or_else(|| std::env::var("SHELL").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| FALLBACK_SHELL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_yield() {
        let settings = ShellSettings::default();
        assert_eq!(
            settings.clamp_yield(None, settings.write_yield),
            Duration::from_millis(250)
        );
        assert_eq!(
            settings.clamp_yield(Some(1), settings.exec_yield),
            Duration::from_millis(10)
        );
        assert_eq!(
            settings.clamp_yield(Some(600_000), settings.exec_yield),
            Duration::from_millis(30_000)
        );
    }

    #[test]
    fn test_page_limits_scale_lines_with_budget() {
        let settings = ShellSettings::default();
        assert_eq!(settings.page_limits(None), PageLimits::new(16_000, 1_000));
        assert_eq!(settings.page_limits(Some(8_000)), PageLimits::new(32_000, 2_000));
        // Small budgets keep the configured line cap
        assert_eq!(settings.page_limits(Some(10)), PageLimits::new(40, 1_000));
    }

    #[test]
    fn test_resolve_shell_prefers_request_then_config() {
        let mut settings = ShellSettings::default();
        assert_eq!(settings.resolve_shell(Some("/bin/zsh")), "/bin/zsh");
        settings.default_shell = Some("/bin/bash".into());
        assert_eq!(settings.resolve_shell(None), "/bin/bash");
    }
}
