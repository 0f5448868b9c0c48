//! Coordinator configuration
//!
//! Configuration can be built in code, read from a JSON file, or taken from
//! `FETCHWRITE_*` environment variables. JSON keys and environment variable
//! suffixes use the same names, with durations given in (fractional) seconds:
//!
//! ```json
//! {
//!   "max_threads": 5,
//!   "max_attempts_per_request": 3,
//!   "initial_delay_seconds": 1,
//!   "max_delay_seconds": 60,
//!   "backoff_factor": 2,
//!   "max_seconds_in_subsequent_backoff": 300,
//!   "thread_sleep_seconds_if_no_work": 0.1
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::reliability::BackoffConfig;

/// Prefix for configuration environment variables
pub const ENV_PREFIX: &str = "FETCHWRITE_";

/// Longest accepted value for any configured duration
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Values are out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Fetch/write coordinator configuration
///
/// # Example
///
/// ```
/// use fetchwrite_coordinator::{BackoffConfig, CoordinatorConfig};
/// use std::time::Duration;
///
/// let config = CoordinatorConfig::new()
///     .with_max_threads(8)
///     .with_max_attempts_per_request(3)
///     .with_backoff(BackoffConfig::new().with_max_delay(Duration::from_secs(60)));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Number of worker threads
    pub max_threads: usize,

    /// Attempts per request, including the first one
    pub max_attempts_per_request: u32,

    /// Rate limiting and circuit breaker settings
    #[serde(flatten)]
    pub backoff: BackoffConfig,

    /// Idle poll interval when both queues are empty
    #[serde(rename = "thread_sleep_seconds_if_no_work", with = "duration_secs")]
    pub thread_sleep_if_no_work: Duration,

    /// Upper bound of the random jitter added to permission waits
    #[serde(rename = "max_wait_jitter_seconds", with = "duration_secs")]
    pub max_wait_jitter: Duration,

    /// Longest single sleep while waiting for the permission token
    #[serde(rename = "max_wait_slice_seconds", with = "duration_secs")]
    pub max_wait_slice: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_threads: 5,
            max_attempts_per_request: 3,
            backoff: BackoffConfig::default(),
            thread_sleep_if_no_work: Duration::from_millis(100),
            max_wait_jitter: Duration::from_millis(50),
            max_wait_slice: Duration::from_secs(1),
        }
    }
}

impl CoordinatorConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `FETCHWRITE_*` environment variables
    ///
    /// Environment variables:
    /// - `FETCHWRITE_MAX_THREADS`
    /// - `FETCHWRITE_MAX_ATTEMPTS_PER_REQUEST`
    /// - `FETCHWRITE_INITIAL_DELAY_SECONDS`
    /// - `FETCHWRITE_MAX_DELAY_SECONDS`
    /// - `FETCHWRITE_BACKOFF_FACTOR`
    /// - `FETCHWRITE_MAX_SECONDS_IN_SUBSEQUENT_BACKOFF`
    /// - `FETCHWRITE_THREAD_SLEEP_SECONDS_IF_NO_WORK`
    /// - `FETCHWRITE_MAX_WAIT_JITTER_SECONDS`
    /// - `FETCHWRITE_MAX_WAIT_SLICE_SECONDS`
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Load from a JSON file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Apply overrides from a variable lookup (e.g. the process environment)
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{}", name.to_uppercase()));
        let secs = |name: &str| {
            var(name)
                .and_then(|s| s.trim().parse::<f64>().ok())
                .and_then(|s| Duration::try_from_secs_f64(s).ok())
        };

        if let Some(v) = var("max_threads").and_then(|s| s.trim().parse().ok()) {
            self.max_threads = v;
        }
        if let Some(v) = var("max_attempts_per_request").and_then(|s| s.trim().parse().ok()) {
            self.max_attempts_per_request = v;
        }
        if let Some(v) = secs("initial_delay_seconds") {
            self.backoff.initial_delay = v;
        }
        if let Some(v) = secs("max_delay_seconds") {
            self.backoff.max_delay = v;
        }
        if let Some(v) = var("backoff_factor").and_then(|s| s.trim().parse().ok()) {
            self.backoff.backoff_factor = v;
        }
        if let Some(v) = secs("max_seconds_in_subsequent_backoff") {
            self.backoff.max_time_in_subsequent_backoff = v;
        }
        if let Some(v) = secs("thread_sleep_seconds_if_no_work") {
            self.thread_sleep_if_no_work = v;
        }
        if let Some(v) = secs("max_wait_jitter_seconds") {
            self.max_wait_jitter = v;
        }
        if let Some(v) = secs("max_wait_slice_seconds") {
            self.max_wait_slice = v;
        }
        self
    }

    /// Set the worker pool size
    pub fn with_max_threads(mut self, max: usize) -> Self {
        self.max_threads = max;
        self
    }

    /// Set the retry ceiling per request
    pub fn with_max_attempts_per_request(mut self, max: u32) -> Self {
        self.max_attempts_per_request = max;
        self
    }

    /// Set the backoff configuration
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the idle poll interval
    pub fn with_thread_sleep_if_no_work(mut self, interval: Duration) -> Self {
        self.thread_sleep_if_no_work = interval;
        self
    }

    /// Set the maximum jitter added to permission waits
    pub fn with_max_wait_jitter(mut self, jitter: Duration) -> Self {
        self.max_wait_jitter = jitter;
        self
    }

    /// Set the longest single permission-wait sleep
    pub fn with_max_wait_slice(mut self, slice: Duration) -> Self {
        self.max_wait_slice = slice;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads == 0 {
            return Err(invalid("max_threads must be at least 1"));
        }
        if self.max_attempts_per_request == 0 {
            return Err(invalid("max_attempts_per_request must be at least 1"));
        }
        let backoff = &self.backoff;
        if backoff.initial_delay.is_zero() {
            return Err(invalid("initial_delay_seconds must be greater than 0"));
        }
        if backoff.initial_delay > backoff.max_delay {
            return Err(invalid(
                "initial_delay_seconds must not exceed max_delay_seconds",
            ));
        }
        if !backoff.backoff_factor.is_finite() || backoff.backoff_factor < 1.0 {
            return Err(invalid("backoff_factor must be a finite number >= 1"));
        }
        if self.thread_sleep_if_no_work.is_zero() {
            return Err(invalid(
                "thread_sleep_seconds_if_no_work must be greater than 0",
            ));
        }
        if self.max_wait_slice.is_zero() {
            return Err(invalid("max_wait_slice_seconds must be greater than 0"));
        }
        let bounded = [
            ("max_delay_seconds", backoff.max_delay),
            (
                "max_seconds_in_subsequent_backoff",
                backoff.max_time_in_subsequent_backoff,
            ),
            ("thread_sleep_seconds_if_no_work", self.thread_sleep_if_no_work),
            ("max_wait_jitter_seconds", self.max_wait_jitter),
            ("max_wait_slice_seconds", self.max_wait_slice),
        ];
        if let Some((key, _)) = bounded.iter().find(|(_, value)| *value > MAX_DURATION) {
            return Err(ConfigError::Invalid(format!(
                "{key} must not exceed {} seconds",
                MAX_DURATION.as_secs()
            )));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}

/// Serde support for Duration as fractional seconds
pub(crate) mod duration_secs {
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

/// Serde support for Option<Duration> as fractional seconds
pub(crate) mod option_duration_secs {
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.map(|d| d.as_secs_f64()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(D::Error::custom))
            .transpose()
    }
}
