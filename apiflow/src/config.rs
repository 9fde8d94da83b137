//! Engine configuration.
//!
//! Every setting has a serde default, so a partial document (or none at all)
//! yields a working configuration. [`EngineConfig::from_env`] overlays
//! `APIFLOW_*` environment variables on top of the defaults.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable overriding [`ExecutorConfig::run_timeout_ms`].
pub const ENV_RUN_TIMEOUT_MS: &str = "APIFLOW_RUN_TIMEOUT_MS";
/// Environment variable overriding [`HubConfig::observer_buffer`].
pub const ENV_OBSERVER_BUFFER: &str = "APIFLOW_OBSERVER_BUFFER";
/// Environment variable overriding [`LoggingConfig::filter`].
pub const ENV_LOG_FILTER: &str = "APIFLOW_LOG_FILTER";
/// Environment variable overriding [`LoggingConfig::format`].
pub const ENV_LOG_FORMAT: &str = "APIFLOW_LOG_FORMAT";

/// Settings for the flow executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Ceiling on a whole run in milliseconds, independent of any caller deadline.
    #[serde(default = "default_run_timeout_ms")]
    pub run_timeout_ms: u64,
}

fn default_run_timeout_ms() -> u64 {
    5 * 60 * 1000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            run_timeout_ms: default_run_timeout_ms(),
        }
    }
}

impl ExecutorConfig {
    /// Creates an executor configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the run ceiling.
    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the run ceiling as a `Duration`.
    #[must_use]
    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }
}

/// Settings for the progress hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Events buffered per observer before it is considered dead and evicted.
    #[serde(default = "default_observer_buffer")]
    pub observer_buffer: usize,
}

fn default_observer_buffer() -> usize {
    256
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            observer_buffer: default_observer_buffer(),
        }
    }
}

impl HubConfig {
    /// Creates a hub configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-observer buffer.
    #[must_use]
    pub fn with_observer_buffer(mut self, capacity: usize) -> Self {
        self.observer_buffer = capacity;
        self
    }
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Settings for log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: LogFormat::default(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executor settings.
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Hub settings.
    #[serde(default)]
    pub hub: HubConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from defaults plus `APIFLOW_*` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but malformed, or if the result
    /// fails [`EngineConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from defaults plus values supplied by `lookup`.
    ///
    /// # Errors
    ///
    /// See [`EngineConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_RUN_TIMEOUT_MS) {
            config.executor.run_timeout_ms = parse_env(ENV_RUN_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_OBSERVER_BUFFER) {
            config.hub.observer_buffer = parse_env(ENV_OBSERVER_BUFFER, &raw)?;
        }
        if let Some(raw) = lookup(ENV_LOG_FILTER) {
            config.logging.filter = raw;
        }
        if let Some(raw) = lookup(ENV_LOG_FORMAT) {
            config.logging.format = parse_env(ENV_LOG_FORMAT, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero run timeout or a zero observer buffer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor.run_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "executor.run_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.hub.observer_buffer == 0 {
            return Err(ConfigError::Invalid(
                "hub.observer_buffer must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
