// CLI commands

pub mod config;
pub mod simulate;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use fetchwrite_coordinator::CoordinatorConfig;

/// Coordinator options shared by every command
#[derive(Args, Debug, Default)]
pub struct CoordinatorArgs {
    /// JSON configuration file (defaults and FETCHWRITE_* env apply underneath)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of worker threads
    #[arg(long, global = true)]
    pub max_threads: Option<usize>,

    /// Attempts per request before it definitively fails
    #[arg(long, global = true)]
    pub max_attempts_per_request: Option<u32>,

    /// Delay between API calls while healthy
    #[arg(long, global = true)]
    pub initial_delay_seconds: Option<f64>,

    /// Upper bound for the backoff delay
    #[arg(long, global = true)]
    pub max_delay_seconds: Option<f64>,

    /// Multiplier applied to the delay on every failure
    #[arg(long, global = true)]
    pub backoff_factor: Option<f64>,

    /// Backoff episode length after which requests are aborted
    #[arg(long, global = true)]
    pub max_seconds_in_subsequent_backoff: Option<f64>,

    /// Idle sleep when no work is available
    #[arg(long, global = true)]
    pub thread_sleep_seconds_if_no_work: Option<f64>,

    /// Random jitter added to permission waits
    #[arg(long, global = true)]
    pub max_wait_jitter_seconds: Option<f64>,

    /// Longest single sleep while waiting for permission
    #[arg(long, global = true)]
    pub max_wait_slice_seconds: Option<f64>,
}

impl CoordinatorArgs {
    /// Build the effective configuration and validate it
    pub fn resolve(&self) -> Result<CoordinatorConfig> {
        let mut config = match &self.config {
            Some(path) => CoordinatorConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
                .with_env_overrides(|key| std::env::var(key).ok()),
            None => CoordinatorConfig::from_env(),
        };

        if let Some(v) = self.max_threads {
            config.max_threads = v;
        }
        if let Some(v) = self.max_attempts_per_request {
            config.max_attempts_per_request = v;
        }
        if let Some(v) = self.initial_delay_seconds {
            config.backoff.initial_delay = seconds("initial-delay-seconds", v)?;
        }
        if let Some(v) = self.max_delay_seconds {
            config.backoff.max_delay = seconds("max-delay-seconds", v)?;
        }
        if let Some(v) = self.backoff_factor {
            config.backoff.backoff_factor = v;
        }
        if let Some(v) = self.max_seconds_in_subsequent_backoff {
            config.backoff.max_time_in_subsequent_backoff =
                seconds("max-seconds-in-subsequent-backoff", v)?;
        }
        if let Some(v) = self.thread_sleep_seconds_if_no_work {
            config.thread_sleep_if_no_work = seconds("thread-sleep-seconds-if-no-work", v)?;
        }
        if let Some(v) = self.max_wait_jitter_seconds {
            config.max_wait_jitter = seconds("max-wait-jitter-seconds", v)?;
        }
        if let Some(v) = self.max_wait_slice_seconds {
            config.max_wait_slice = seconds("max-wait-slice-seconds", v)?;
        }

        config.validate().context("Invalid coordinator configuration")?;
        Ok(config)
    }
}

fn seconds(flag: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("--{flag}: {value} is not a valid duration"))
}
