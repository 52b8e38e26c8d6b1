//! Configuration Module
//!
//! Handles loading, building and validating cache configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default directory for persisted values, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Cache configuration parameters.
///
/// Durations are signed milliseconds so that negative inputs can be
/// represented and rejected by [`Config::validate`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Period between cleaner scans in milliseconds
    pub scan_interval_ms: i64,
    /// How long an entry stays in memory before it becomes eviction-eligible
    pub retention_ms: i64,
    /// Demote evicted entries to disk instead of dropping them
    pub persistence_enabled: bool,
    /// Directory holding one file per persisted key
    pub data_dir: PathBuf,
    /// Emit diagnostic events for evictions, reads and writes
    pub log_enabled: bool,
}

impl Config {
    /// Creates a config with the given timings and default everything else.
    pub fn new(scan_interval: Duration, retention: Duration) -> Self {
        Self {
            scan_interval_ms: duration_to_ms(scan_interval),
            retention_ms: duration_to_ms(retention),
            ..Self::default()
        }
    }

    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SCAN_INTERVAL_MS` - Cleaner scan period (default: 1000)
    /// - `RETENTION_MS` - In-memory retention window (default: 1000)
    /// - `PERSISTENCE_ENABLED` - Spill evicted entries to disk (default: true)
    /// - `DATA_DIR` - Directory for persisted values (default: "data")
    /// - `CACHE_LOG` - Emit diagnostic events (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            scan_interval_ms: env::var("SCAN_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.scan_interval_ms),
            retention_ms: env::var("RETENTION_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.retention_ms),
            persistence_enabled: env::var("PERSISTENCE_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.persistence_enabled),
            data_dir: env::var("DATA_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            log_enabled: env::var("CACHE_LOG")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_enabled),
        }
    }

    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.persistence_enabled = enabled;
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.log_enabled = enabled;
        self
    }

    // == Validate ==
    /// Checks the timing invariants and returns `(scan_interval, retention)`.
    ///
    /// The scan interval must be strictly positive; retention may be zero,
    /// which makes every entry eligible on the next scan.
    pub fn validate(&self) -> Result<(Duration, Duration)> {
        if self.scan_interval_ms <= 0 {
            return Err(CacheError::InvalidConfiguration(format!(
                "scan interval must be positive, got {}ms",
                self.scan_interval_ms
            )));
        }
        if self.retention_ms < 0 {
            return Err(CacheError::InvalidConfiguration(format!(
                "retention must not be negative, got {}ms",
                self.retention_ms
            )));
        }

        Ok((
            Duration::from_millis(self.scan_interval_ms as u64),
            Duration::from_millis(self.retention_ms as u64),
        ))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_interval_ms: 1000,
            retention_ms: 1000,
            persistence_enabled: true,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            log_enabled: true,
        }
    }
}

fn duration_to_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
