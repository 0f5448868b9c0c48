//! Shared rate limiter with exponential backoff and a circuit breaker
//!
//! A [`BackoffManager`] hands out a single permission token. Every grant pushes
//! the release time `current_delay` into the future, so at most one API call
//! happens per delay window no matter how many workers ask. Failures grow the
//! delay, a success resets it, and an episode of failures that lasts longer
//! than `max_time_in_subsequent_backoff` trips the breaker.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::circuit_breaker::{BackoffSnapshot, BreakerState};
use crate::config::duration_secs;

/// Backoff and circuit-breaker configuration
///
/// # Example
///
/// ```
/// use fetchwrite_coordinator::BackoffConfig;
/// use std::time::Duration;
///
/// let config = BackoffConfig::default()
///     .with_initial_delay(Duration::from_secs(1))
///     .with_max_delay(Duration::from_secs(60))
///     .with_backoff_factor(2.0);
///
/// // Delays after consecutive failures: 2s, 4s, 8s, ... capped at 60s
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackoffConfig {
    /// Spacing between API calls while the API is healthy
    #[serde(rename = "initial_delay_seconds", with = "duration_secs")]
    pub initial_delay: Duration,

    /// Upper bound for the spacing between API calls
    #[serde(rename = "max_delay_seconds", with = "duration_secs")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay on every failure
    pub backoff_factor: f64,

    /// How long a backoff episode may last before requests are aborted
    #[serde(rename = "max_seconds_in_subsequent_backoff", with = "duration_secs")]
    pub max_time_in_subsequent_backoff: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5 * 60),
            backoff_factor: 2.0,
            max_time_in_subsequent_backoff: Duration::from_secs(5 * 60),
        }
    }
}

impl BackoffConfig {
    /// Create a new backoff configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the starting spacing between calls
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the ceiling for the spacing between calls
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the growth factor per failure
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the circuit-breaker threshold
    pub fn with_max_time_in_subsequent_backoff(mut self, limit: Duration) -> Self {
        self.max_time_in_subsequent_backoff = limit;
        self
    }
}

#[derive(Debug)]
struct BackoffState {
    current_delay: Duration,
    /// No permission is granted before this instant. `None` until the first grant.
    delay_release_time: Option<Instant>,
    /// Start of the current backoff episode. `None` means reset.
    kickin_time: Option<Instant>,
    /// Set once the trip of the current episode has been logged.
    trip_reported: bool,
}

/// Rate limiter and circuit breaker shared by all workers
///
/// All operations take one short lock and never sleep or log while holding it.
/// Each time-dependent operation has an `*_at` variant taking the current
/// instant, for callers that drive their own clock.
#[derive(Debug)]
pub struct BackoffManager {
    config: BackoffConfig,
    state: Mutex<BackoffState>,
}

impl BackoffManager {
    /// Create a manager starting at `initial_delay` with no episode in progress
    pub fn new(config: BackoffConfig) -> Self {
        let state = BackoffState {
            current_delay: config.initial_delay,
            delay_release_time: None,
            kickin_time: None,
            trip_reported: false,
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Try to take the permission token
    ///
    /// Returns `true` if the release time has passed; the next release is then
    /// pushed `current_delay` into the future.
    pub fn acquire_api_call_permission(&self) -> bool {
        self.acquire_api_call_permission_at(Instant::now())
    }

    pub fn acquire_api_call_permission_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        let released = match state.delay_release_time {
            Some(release) => now > release,
            None => true,
        };
        if released {
            state.delay_release_time = Some(release_after(now, state.current_delay));
        }
        released
    }

    /// Minimum time to wait before the token can be acquired again
    pub fn wait_time(&self) -> Duration {
        self.wait_time_at(Instant::now())
    }

    pub fn wait_time_at(&self, now: Instant) -> Duration {
        let state = self.state.lock();
        state
            .delay_release_time
            .map(|release| release.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Grow the delay after a failed call
    ///
    /// The first increase after a reset starts a new backoff episode.
    pub fn increase_backoff(&self) {
        self.increase_backoff_at(Instant::now())
    }

    pub fn increase_backoff_at(&self, now: Instant) {
        let (current_delay, episode_started) = {
            let mut state = self.state.lock();
            let episode_started = state.kickin_time.is_none();
            if episode_started {
                state.kickin_time = Some(now);
                state.trip_reported = false;
            }
            state.current_delay = scale_delay(
                state.current_delay,
                self.config.backoff_factor,
                self.config.max_delay,
            );
            (state.current_delay, episode_started)
        };

        debug!(
            current_delay_ms = current_delay.as_millis() as u64,
            episode_started, "Increased backoff"
        );
    }

    /// Return to the initial delay and end the current episode
    pub fn reset_backoff(&self) {
        let was_backing_off = {
            let mut state = self.state.lock();
            let was_backing_off = state.kickin_time.is_some();
            state.current_delay = self.config.initial_delay;
            state.kickin_time = None;
            state.trip_reported = false;
            was_backing_off
        };

        if was_backing_off {
            debug!(
                current_delay_ms = self.config.initial_delay.as_millis() as u64,
                "Backoff reset"
            );
        }
    }

    /// Whether the current backoff episode has outlasted the breaker threshold
    pub fn has_exceeded_max_time_in_subsequent_backoff(&self) -> bool {
        self.has_exceeded_max_time_in_subsequent_backoff_at(Instant::now())
    }

    pub fn has_exceeded_max_time_in_subsequent_backoff_at(&self, now: Instant) -> bool {
        let newly_tripped = {
            let mut state = self.state.lock();
            let Some(kickin) = state.kickin_time else {
                return false;
            };
            let elapsed = now.saturating_duration_since(kickin);
            if elapsed <= self.config.max_time_in_subsequent_backoff {
                return false;
            }
            let first = !state.trip_reported;
            state.trip_reported = true;
            first.then_some(elapsed)
        };

        if let Some(elapsed) = newly_tripped {
            warn!(
                episode_elapsed_ms = elapsed.as_millis() as u64,
                limit_ms = self.config.max_time_in_subsequent_backoff.as_millis() as u64,
                "Circuit breaker tripped, aborting remaining requests"
            );
        }
        true
    }

    /// Current spacing between calls
    pub fn current_delay(&self) -> Duration {
        self.state.lock().current_delay
    }

    /// True when no backoff episode is in progress
    pub fn is_reset(&self) -> bool {
        self.state.lock().kickin_time.is_none()
    }

    /// Time since the current episode started, if one is in progress
    pub fn episode_elapsed(&self) -> Option<Duration> {
        self.episode_elapsed_at(Instant::now())
    }

    pub fn episode_elapsed_at(&self, now: Instant) -> Option<Duration> {
        self.state
            .lock()
            .kickin_time
            .map(|kickin| now.saturating_duration_since(kickin))
    }

    /// Consistent view of the limiter, taken under one lock
    pub fn snapshot(&self) -> BackoffSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> BackoffSnapshot {
        let state = self.state.lock();
        let episode_elapsed = state
            .kickin_time
            .map(|kickin| now.saturating_duration_since(kickin));
        let breaker = match episode_elapsed {
            None => BreakerState::Closed,
            Some(elapsed) if elapsed > self.config.max_time_in_subsequent_backoff => {
                BreakerState::Tripped
            }
            Some(_) => BreakerState::BackingOff,
        };
        BackoffSnapshot {
            breaker,
            current_delay: state.current_delay,
            wait: state
                .delay_release_time
                .map(|release| release.saturating_duration_since(now))
                .unwrap_or(Duration::ZERO),
            episode_elapsed,
        }
    }
}

/// `now + delay`, clamped to the latest instant the platform can represent
fn release_after(now: Instant, delay: Duration) -> Instant {
    let mut delay = delay;
    loop {
        if let Some(release) = now.checked_add(delay) {
            return release;
        }
        delay /= 2;
    }
}

fn scale_delay(current: Duration, factor: f64, max: Duration) -> Duration {
    let scaled = current.as_secs_f64() * factor;
    if !scaled.is_finite() || scaled >= max.as_secs_f64() {
        return max;
    }
    Duration::from_secs_f64(scaled).max(current)
}
