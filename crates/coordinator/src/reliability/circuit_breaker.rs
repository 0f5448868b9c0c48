//! Circuit breaker state reported by the backoff manager

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{duration_secs, option_duration_secs};

/// Circuit breaker states
///
/// # State Machine
///
/// ```text
///                 failure                      episode > max_time_in_subsequent_backoff
/// ┌─────────┐  ─────────────► ┌────────────┐  ─────────────────────────────────────► ┌─────────┐
/// │ Closed  │                 │ BackingOff │                                          │ Tripped │
/// └─────────┘  ◄───────────── └────────────┘                                          └─────────┘
///      ▲          success                                                                  │
///      └───────────────────────────────────── success ─────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// No backoff episode in progress
    Closed,

    /// Failures are spacing calls out, requests still retried
    BackingOff,

    /// The episode outlasted its limit - requests are aborted
    Tripped,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::BackingOff => write!(f, "backing_off"),
            Self::Tripped => write!(f, "tripped"),
        }
    }
}

/// Point-in-time view of a [`BackoffManager`](super::BackoffManager)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackoffSnapshot {
    pub breaker: BreakerState,

    /// Spacing currently enforced between calls
    #[serde(rename = "current_delay_seconds", with = "duration_secs")]
    pub current_delay: Duration,

    /// Time left before the permission token is released
    #[serde(rename = "wait_seconds", with = "duration_secs")]
    pub wait: Duration,

    /// Age of the current backoff episode
    #[serde(rename = "episode_elapsed_seconds", with = "option_duration_secs")]
    pub episode_elapsed: Option<Duration>,
}

/// Why a request was dropped before using all of its attempts
#[derive(Debug, Clone, PartialEq)]
pub enum AbortReason {
    /// The backoff episode lasted longer than the configured limit
    CircuitBreakerTripped {
        /// Attempt the request would have made (or was making) when dropped
        attempt: u32,
        episode_elapsed: Duration,
        limit: Duration,
    },
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CircuitBreakerTripped {
                attempt,
                episode_elapsed,
                limit,
            } => write!(
                f,
                "circuit breaker tripped at attempt {attempt}: backing off for {:.3}s (limit {:.3}s)",
                episode_elapsed.as_secs_f64(),
                limit.as_secs_f64()
            ),
        }
    }
}
