use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::schema::TurnstileConfig;

/// Loads and reloads the Turnstile configuration.
pub struct ConfigLoader {
    config: Arc<RwLock<TurnstileConfig>>,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > TURNSTILE_CONFIG env > ~/.turnstile/turnstile.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("TURNSTILE_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".turnstile")
            .join("turnstile.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> turnstile_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            Self::read_file(&config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            TurnstileConfig::default()
        };

        let config = Self::apply_env_overrides(config);
        Self::check(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// Get a read snapshot of the current config.
    pub fn get(&self) -> TurnstileConfig {
        self.config.read().clone()
    }

    /// Path the config was loaded from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Reload the config from disk. The current config is kept when the new
    /// file fails to parse or validate.
    pub fn reload(&self) -> turnstile_core::Result<TurnstileConfig> {
        if !self.config_path.exists() {
            return Err(turnstile_core::TurnstileError::Config(format!(
                "config file not found: {}",
                self.config_path.display()
            )));
        }
        let new_config = Self::apply_env_overrides(Self::read_file(&self.config_path)?);
        Self::check(&new_config)?;
        *self.config.write() = new_config.clone();
        info!("configuration reloaded");
        Ok(new_config)
    }

    fn read_file(path: &Path) -> turnstile_core::Result<TurnstileConfig> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str::<TurnstileConfig>(&raw).map_err(|e| {
            turnstile_core::TurnstileError::Config(format!(
                "failed to parse {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Validate config: log warnings, fail on errors.
    fn check(config: &TurnstileConfig) -> turnstile_core::Result<()> {
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
                Ok(())
            }
            Err(e) => Err(turnstile_core::TurnstileError::Config(e)),
        }
    }

    /// Apply env var overrides (TURNSTILE_MAX_CONCURRENCY, TURNSTILE_LOG_LEVEL, etc.)
    fn apply_env_overrides(mut config: TurnstileConfig) -> TurnstileConfig {
        if let Ok(v) = std::env::var("TURNSTILE_MAX_CONCURRENCY") {
            match v.parse::<usize>() {
                Ok(n) => config.lanes.max_concurrency = n,
                Err(_) => warn!(value = %v, "ignoring invalid TURNSTILE_MAX_CONCURRENCY"),
            }
        }
        if let Ok(v) = std::env::var("TURNSTILE_CORRECTION_MERGE") {
            match v.as_str() {
                "1" | "true" | "on" => config.lanes.enable_correction_merge = true,
                "0" | "false" | "off" => config.lanes.enable_correction_merge = false,
                _ => warn!(value = %v, "ignoring invalid TURNSTILE_CORRECTION_MERGE"),
            }
        }
        if let Ok(v) = std::env::var("TURNSTILE_LOG_LEVEL") {
            config.logging.level = v;
        }
        config
    }
}
