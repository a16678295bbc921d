//! Configuration management for batchers.

use crate::{BatcherError, BatcherResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable overriding [`BatcherConfig::name`]
pub const ENV_NAME: &str = "BATCHER_NAME";
/// Environment variable overriding [`BatcherConfig::max_batch_size`]
pub const ENV_MAX_BATCH_SIZE: &str = "BATCHER_MAX_BATCH_SIZE";
/// Environment variable overriding [`BatcherConfig::max_wait_ms`]
pub const ENV_MAX_WAIT_MS: &str = "BATCHER_MAX_WAIT_MS";
/// Environment variable overriding [`BatcherConfig::max_concurrent_batches`]
pub const ENV_MAX_CONCURRENT_BATCHES: &str = "BATCHER_MAX_CONCURRENT_BATCHES";
/// Environment variable overriding [`BatcherConfig::log_level`]
pub const ENV_LOG_LEVEL: &str = "BATCHER_LOG_LEVEL";

const MAX_CONCURRENT_BATCHES_LIMIT: usize = 1024;

/// Main configuration for a batcher
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// name = "embedder"
/// max_batch_size = 64
/// max_wait_ms = 25
///
/// [retry]
/// max_retries = 2
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatcherConfig {
    /// Name used to label logs and metrics
    #[serde(default = "default_name")]
    pub name: String,

    /// Largest number of items a batch may contain (>= 1)
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Longest time the oldest pending item waits before its batch closes.
    /// Zero closes a batch as soon as one item is pending.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,

    /// Number of batches allowed to execute at once. With 1, the next batch
    /// is formed only after the previous one finished executing, so items
    /// arriving during a slow batch can wait longer than `max_wait_ms`.
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,

    /// Settings for [`Batcher::call_with_retry`](crate::Batcher::call_with_retry)
    #[serde(default)]
    pub retry: RetrySettings,

    /// Log level used when no `RUST_LOG` filter is set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_name() -> String {
    "batcher".to_string()
}
fn default_max_batch_size() -> usize {
    32
}
fn default_max_wait_ms() -> u64 {
    10
}
fn default_max_concurrent_batches() -> usize {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}

impl BatcherConfig {
    /// Create a configuration with the two batching triggers set explicitly
    pub fn new(max_batch_size: usize, max_wait: Duration) -> Self {
        Self {
            max_batch_size,
            max_wait_ms: max_wait.as_millis().try_into().unwrap_or(u64::MAX),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_concurrent_batches(mut self, max_concurrent_batches: usize) -> Self {
        self.max_concurrent_batches = max_concurrent_batches;
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }

    /// The wait trigger as a [`Duration`]
    pub fn max_wait_time(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Load configuration from defaults plus environment overrides
    pub fn from_env() -> BatcherResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> BatcherResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BatcherError::config(format!("Failed to read config file {}: {}", path, e))
        })?;

        Self::from_toml_str(&content)
            .map_err(|e| BatcherError::config(format!("Failed to parse config file {}: {}", path, e)))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> BatcherResult<Self> {
        toml::from_str(content).map_err(|e| BatcherError::config(e.to_string()))
    }

    /// Apply `BATCHER_*` environment variable overrides
    ///
    /// Unset variables leave the current value alone; unparsable values are
    /// configuration errors.
    pub fn apply_env_overrides(&mut self) -> BatcherResult<()> {
        if let Ok(val) = env::var(ENV_NAME) {
            self.name = val;
        }
        if let Some(val) = parse_env(ENV_MAX_BATCH_SIZE)? {
            self.max_batch_size = val;
        }
        if let Some(val) = parse_env(ENV_MAX_WAIT_MS)? {
            self.max_wait_ms = val;
        }
        if let Some(val) = parse_env(ENV_MAX_CONCURRENT_BATCHES)? {
            self.max_concurrent_batches = val;
        }
        if let Ok(val) = env::var(ENV_LOG_LEVEL) {
            self.log_level = val;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> BatcherResult<()> {
        if self.name.is_empty() {
            return Err(BatcherError::config("name cannot be empty"));
        }

        if self.max_batch_size == 0 {
            return Err(BatcherError::config("max_batch_size must be > 0"));
        }

        if self.max_concurrent_batches == 0 {
            return Err(BatcherError::config("max_concurrent_batches must be > 0"));
        }

        if self.max_concurrent_batches > MAX_CONCURRENT_BATCHES_LIMIT {
            return Err(BatcherError::config(format!(
                "max_concurrent_batches too high (max {})",
                MAX_CONCURRENT_BATCHES_LIMIT
            )));
        }

        if self.retry.max_retries > 100 {
            return Err(BatcherError::config("max_retries too high (max 100)"));
        }

        if self.retry.retry_backoff_ms > self.retry.max_backoff_ms {
            return Err(BatcherError::config(
                "retry_backoff_ms cannot exceed max_backoff_ms",
            ));
        }

        Ok(())
    }
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_batch_size: default_max_batch_size(),
            max_wait_ms: default_max_wait_ms(),
            max_concurrent_batches: default_max_concurrent_batches(),
            retry: RetrySettings::default(),
            log_level: default_log_level(),
        }
    }
}

fn parse_env<T>(key: &str) -> BatcherResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| BatcherError::config(format!("Invalid {} '{}': {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}

/// Retry configuration for caller-side resubmission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Maximum number of resubmissions after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff duration in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    100
}
fn default_max_backoff_ms() -> u64 {
    5000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}
