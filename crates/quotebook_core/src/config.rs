//! Runtime configuration.
//!
//! # Responsibility
//! - Define storage, logging and sync settings with working defaults.
//! - Load settings from JSON and apply `QUOTEBOOK_*` environment overrides.
//!
//! # Invariants
//! - A config that passed `validate()` never yields a zero interval, limit or
//!   timeout, nor a blank endpoint.

use crate::sync::scheduler::DEFAULT_SYNC_INTERVAL;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DEFAULT_SYNC_ENDPOINT: &str = "https://jsonplaceholder.typicode.com/posts";

const ENV_DB_PATH: &str = "QUOTEBOOK_DB_PATH";
const ENV_LOG_LEVEL: &str = "QUOTEBOOK_LOG_LEVEL";
const ENV_LOG_DIR: &str = "QUOTEBOOK_LOG_DIR";
const ENV_SYNC_ENABLED: &str = "QUOTEBOOK_SYNC_ENABLED";
const ENV_SYNC_INTERVAL_SECS: &str = "QUOTEBOOK_SYNC_INTERVAL_SECS";
const ENV_SYNC_ENDPOINT: &str = "QUOTEBOOK_SYNC_ENDPOINT";

/// Configuration loading/validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    InvalidValue { key: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "invalid config document: {message}"),
            Self::InvalidValue { key, message } => write!(f, "invalid `{key}`: {message}"),
        }
    }
}

impl Error for ConfigError {}

/// Remote sync settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub endpoint: String,
    /// Maximum number of remote records taken per fetch.
    pub fetch_limit: usize,
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: DEFAULT_SYNC_INTERVAL.as_secs(),
            endpoint: DEFAULT_SYNC_ENDPOINT.to_string(),
            fetch_limit: 5,
            request_timeout_secs: 30,
        }
    }
}

/// Top-level quotebook configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuotebookConfig {
    /// SQLite file for the durable store; in-memory when unset.
    pub db_path: Option<PathBuf>,
    /// Log level; build-mode default when unset.
    pub log_level: Option<String>,
    /// Absolute log directory; file logging is skipped when unset.
    pub log_dir: Option<String>,
    pub sync: SyncConfig,
}

impl QuotebookConfig {
    /// Parses a JSON config document; missing keys take defaults.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(document).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `QUOTEBOOK_*` overrides read through `lookup`.
    ///
    /// Blank values are ignored.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(path) = read(ENV_DB_PATH) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            self.log_level = Some(level);
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            self.log_dir = Some(dir);
        }
        if let Some(raw) = read(ENV_SYNC_ENABLED) {
            self.sync.enabled = parse_bool(ENV_SYNC_ENABLED, &raw)?;
        }
        if let Some(raw) = read(ENV_SYNC_INTERVAL_SECS) {
            self.sync.interval_secs = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_SYNC_INTERVAL_SECS,
                message: format!("expected whole seconds, got `{raw}`"),
            })?;
        }
        if let Some(endpoint) = read(ENV_SYNC_ENDPOINT) {
            self.sync.endpoint = endpoint;
        }
        Ok(())
    }

    /// Checks value ranges.
    ///
    /// # Errors
    /// - `InvalidValue` naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.interval_secs == 0 {
            return Err(invalid("sync.intervalSecs", "must be greater than zero"));
        }
        if self.sync.fetch_limit == 0 {
            return Err(invalid("sync.fetchLimit", "must be greater than zero"));
        }
        if self.sync.request_timeout_secs == 0 {
            return Err(invalid(
                "sync.requestTimeoutSecs",
                "must be greater than zero",
            ));
        }
        if self.sync.endpoint.trim().is_empty() {
            return Err(invalid("sync.endpoint", "cannot be empty"));
        }
        Ok(())
    }
}

fn invalid(key: &'static str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        message: message.to_string(),
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            message: format!("expected a boolean, got `{raw}`"),
        }),
    }
}
