//! Configuration file parser for ~/.config/feedsched/config.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos. `FEEDSCHED_BATCH_SIZE` and
//! `FEEDSCHED_POLLING_FREQUENCY` override the file.
use chrono::TimeDelta;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::policy::{
    CadenceTier, PolicyError, RefreshPolicy, DEFAULT_CADENCE, DEFAULT_DORMANT_INTERVAL_HOURS,
    DEFAULT_ERROR_THRESHOLD,
};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid refresh policy: {0}")]
    InvalidPolicy(#[from] PolicyError),

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level scheduler configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of jobs per batch.
    pub batch_size: usize,

    /// Minutes between two global batches.
    pub polling_frequency_minutes: u64,

    /// SQLite database path. Defaults to `feeds.db` next to the config file.
    pub database_path: Option<PathBuf>,

    /// Error threshold and cadence tiers.
    pub policy: PolicyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: 100,
            polling_frequency_minutes: 60,
            database_path: None,
            policy: PolicyConfig::default(),
        }
    }
}

/// `[policy]` section. Converted into a [`RefreshPolicy`] by [`Config::policy`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub error_threshold: i64,
    pub dormant_interval_hours: i64,
    pub cadence: Vec<CadenceConfig>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            dormant_interval_hours: DEFAULT_DORMANT_INTERVAL_HOURS,
            cadence: DEFAULT_CADENCE
                .iter()
                .map(|&(younger_than_days, interval_hours)| CadenceConfig {
                    younger_than_days,
                    interval_hours,
                })
                .collect(),
        }
    }
}

/// One `[[policy.cadence]]` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CadenceConfig {
    pub younger_than_days: i64,
    pub interval_hours: i64,
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(path)?;
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading to avoid loading a corrupted multi-GB file
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "batch_size",
                "polling_frequency_minutes",
                "database_path",
                "policy",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            batch_size = config.batch_size,
            polling_frequency_minutes = config.polling_frequency_minutes,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Longest accepted polling frequency (one year).
    const MAX_POLLING_FREQUENCY_MINUTES: u64 = 365 * 24 * 60;

    /// Time between two global batches, clamped to one minute .. one year.
    pub fn polling_frequency(&self) -> Duration {
        let minutes = self
            .polling_frequency_minutes
            .clamp(1, Self::MAX_POLLING_FREQUENCY_MINUTES);
        Duration::from_secs(minutes * 60)
    }

    /// Apply `FEEDSCHED_*` overrides looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("FEEDSCHED_BATCH_SIZE") {
            self.batch_size = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "FEEDSCHED_BATCH_SIZE",
                value,
            })?;
        }
        if let Some(value) = lookup("FEEDSCHED_POLLING_FREQUENCY") {
            self.polling_frequency_minutes =
                value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    var: "FEEDSCHED_POLLING_FREQUENCY",
                    value,
                })?;
        }
        Ok(())
    }

    /// Validate the `[policy]` section and build a [`RefreshPolicy`].
    pub fn policy(&self) -> Result<RefreshPolicy, ConfigError> {
        let tiers = self
            .policy
            .cadence
            .iter()
            .map(|tier| -> Result<CadenceTier, PolicyError> {
                Ok(CadenceTier {
                    younger_than: TimeDelta::try_days(tier.younger_than_days)
                        .ok_or(PolicyError::OutOfRange)?,
                    interval: TimeDelta::try_hours(tier.interval_hours)
                        .ok_or(PolicyError::OutOfRange)?,
                })
            })
            .collect::<Result<Vec<_>, PolicyError>>()?;
        let dormant_interval = TimeDelta::try_hours(self.policy.dormant_interval_hours)
            .ok_or(PolicyError::OutOfRange)?;
        let policy = RefreshPolicy::new(self.policy.error_threshold, tiers, dormant_interval)?;
        Ok(policy)
    }
}

// ============================================================================
// Tests
// ============================================================================
