use clap::{Parser, Subcommand};
use std::path::PathBuf;

use turnstile_config::{ConfigLoader, TurnstileConfig};

mod exec;
mod simulate;

/// Turnstile: lane scheduling and interactive shell sessions for agent runtimes
#[derive(Parser)]
#[command(name = "turnstile", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to turnstile.toml config file
    #[arg(short, long, global = true, env = "TURNSTILE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a command through the shell session manager and print its output page
    Exec {
        /// Command line passed to the shell
        cmd: String,
        /// Working directory (defaults to the current directory)
        #[arg(short, long)]
        workdir: Option<String>,
        /// Bounded wait per poll, in milliseconds
        #[arg(long)]
        yield_ms: Option<u64>,
        /// Output budget per page (about 4 characters per token)
        #[arg(long)]
        max_tokens: Option<usize>,
        /// Keep polling and printing pages until the process exits
        #[arg(short, long)]
        follow: bool,
    },
    /// Enqueue one job per key against a sleeping executor and print the lane events
    Simulate {
        /// Chat keys, e.g. telegram:42 api:7 telegram:42
        #[arg(required = true)]
        keys: Vec<String>,
        /// How long each round of the simulated executor takes
        #[arg(long, default_value = "200")]
        delay_ms: u64,
        /// Gap between consecutive enqueues
        #[arg(long, default_value = "0")]
        gap_ms: u64,
    },
}

impl Cli {
    pub async fn run(self) -> turnstile_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level.as_deref().unwrap_or(&config.logging.level)
        };
        init_tracing(&config.logging.format, log_level);

        match self.command {
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Exec {
                cmd,
                workdir,
                yield_ms,
                max_tokens,
                follow,
            } => exec::cmd_exec(config, cmd, workdir, yield_ms, max_tokens, follow).await,
            Commands::Simulate {
                keys,
                delay_ms,
                gap_ms,
            } => simulate::cmd_simulate(config, keys, delay_ms, gap_ms).await,
        }
    }

    fn cmd_config(config: TurnstileConfig, json: bool) -> turnstile_core::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config)
                    .map_err(|e| turnstile_core::TurnstileError::Config(e.to_string()))?
            );
        }
        Ok(())
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(format: &str, log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        "json" => builder.json().with_target(true).init(),
        "compact" => builder.compact().with_target(false).init(),
        _ => builder.with_target(false).init(),
    }
}
