use serde::{Deserialize, Serialize};

/// Root configuration, maps to `turnstile.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnstileConfig {
    pub lanes: LanesConfig,
    pub shell: ShellConfig,
    pub logging: LoggingConfig,
}

// ── Lanes ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanesConfig {
    /// Maximum number of lanes running a turn at the same time.
    pub max_concurrency: usize,
    /// Fold messages that arrive while a turn runs into a follow-up round.
    pub enable_correction_merge: bool,
    /// Maximum follow-up rounds per turn.
    pub correction_max_rounds: u32,
    /// Maximum jobs folded into one follow-up round.
    pub correction_max_merged_messages: usize,
    /// Wall-clock seconds a single round may run before it is failed.
    /// 0 = no timeout.
    pub job_timeout_secs: u64,
    /// Idle lanes older than this are pruned. 0 = never prune.
    pub lane_idle_ttl_secs: u64,
}

impl Default for LanesConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            enable_correction_merge: true,
            correction_max_rounds: 2,
            correction_max_merged_messages: 5,
            job_timeout_secs: 0,
            lane_idle_ttl_secs: 3600,
        }
    }
}

// ── Shell ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell used to run commands. Falls back to `$SHELL`, then `/bin/sh`.
    pub default_shell: Option<String>,
    /// Buffered output ceiling per context, in characters. Oldest output is
    /// evicted beyond this.
    pub max_buffer_chars: usize,
    /// Page budget used when a call does not pass `max_output_tokens`.
    pub default_max_output_tokens: usize,
    /// Line cap of a page at the default budget. Larger `max_output_tokens`
    /// requests scale it up proportionally.
    pub max_page_lines: usize,
    /// Default bounded wait for `exec_command`.
    pub exec_yield_ms: u64,
    /// Default bounded wait for `write_stdin`.
    pub write_yield_ms: u64,
    pub min_yield_ms: u64,
    pub max_yield_ms: u64,
    /// How long to wait for output readers to drain after the process exits.
    pub exit_flush_ms: u64,
    /// Exited contexts untouched for this long are reclaimed.
    pub cleanup_grace_secs: u64,
    /// Strip ANSI escape sequences from paged output.
    pub strip_ansi: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            default_shell: None,
            max_buffer_chars: 256 * 1024,
            default_max_output_tokens: 4_000,
            max_page_lines: 1_000,
            exec_yield_ms: 10_000,
            write_yield_ms: 250,
            min_yield_ms: 10,
            max_yield_ms: 30_000,
            exit_flush_ms: 100,
            cleanup_grace_secs: 1_800,
            strip_ansi: true,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
            WarningSeverity::Info => "info",
        };
        write!(f, "{}: {}: {}", label, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl TurnstileConfig {
    /// Validate the config and return a list of warnings.
    /// Returns `Err` with all error messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Lanes ───
        if self.lanes.max_concurrency == 0 {
            warnings.push(ConfigWarning {
                field: "lanes.max_concurrency".into(),
                message: "max_concurrency is 0, so no job would ever run".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 4".into()),
            });
        }
        if self.lanes.enable_correction_merge {
            if self.lanes.correction_max_merged_messages == 0 {
                warnings.push(ConfigWarning {
                    field: "lanes.correction_max_merged_messages".into(),
                    message: "merging is enabled but folds 0 messages per round".into(),
                    severity: WarningSeverity::Warning,
                    hint: Some("Set enable_correction_merge = false to disable merging".into()),
                });
            }
            if self.lanes.correction_max_rounds > 10 {
                warnings.push(ConfigWarning {
                    field: "lanes.correction_max_rounds".into(),
                    message: format!(
                        "{} rounds per turn lets one chatty user hold a slot for a long time",
                        self.lanes.correction_max_rounds
                    ),
                    severity: WarningSeverity::Warning,
                    hint: Some("Values between 1 and 3 are typical".into()),
                });
            }
        }

        // ── Shell ───
        if self.shell.max_buffer_chars == 0 {
            warnings.push(ConfigWarning {
                field: "shell.max_buffer_chars".into(),
                message: "buffer ceiling is 0, so all output would be discarded".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 262144".into()),
            });
        }
        if self.shell.min_yield_ms > self.shell.max_yield_ms {
            warnings.push(ConfigWarning {
                field: "shell.min_yield_ms".into(),
                message: format!(
                    "min_yield_ms ({}) is greater than max_yield_ms ({})",
                    self.shell.min_yield_ms, self.shell.max_yield_ms
                ),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }
        if self.shell.max_page_lines == 0 || self.shell.default_max_output_tokens == 0 {
            warnings.push(ConfigWarning {
                field: "shell.max_page_lines".into(),
                message: "pages would always be empty".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }
        if self.shell.cleanup_grace_secs == 0 {
            warnings.push(ConfigWarning {
                field: "shell.cleanup_grace_secs".into(),
                message: "exited shells are reclaimed immediately, before output can be read".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Use at least a few seconds".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
