//! Configuration loading for subsync.
//!
//! Configuration is loaded from a TOML file. Every section and field is
//! optional; missing values fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for subsync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Sync query configuration.
    #[serde(default)]
    pub query: QueryConfig,
    /// Reachability probe configuration.
    #[serde(default)]
    pub reachability: ReachabilityConfig,
    /// Status aggregation configuration.
    #[serde(default)]
    pub status: StatusConfig,
}

/// Sync query configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// How long a one-shot query waits before resolving `NoConnection`
    /// (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Reachability probe configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityConfig {
    /// Address the polling probe connects to (default: 1.1.1.1:443).
    #[serde(default = "default_probe_address")]
    pub probe_address: String,
    /// Seconds between probes (default: 5).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Connect timeout for a single probe in milliseconds (default: 2000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Status aggregation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Buffer size of the status broadcast channel (default: 64).
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

// Default value functions
fn default_timeout_secs() -> u64 {
    10
}

fn default_probe_address() -> String {
    "1.1.1.1:443".to_string()
}

fn default_interval_secs() -> u64 {
    5
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

fn default_event_capacity() -> usize {
    64
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            probe_address: default_probe_address(),
            interval_secs: default_interval_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
        }
    }
}

impl QueryConfig {
    /// The one-shot timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ReachabilityConfig {
    /// Time between probes.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Connect timeout for a single probe.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reachability.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "reachability.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.reachability.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "reachability.connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Configuration parsed but holds an unusable value.
    #[error("invalid config: {0}")]
    Invalid(String),
}
