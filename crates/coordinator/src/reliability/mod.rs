//! Reliability patterns for remote API calls
//!
//! This module provides:
//! - [`BackoffManager`] - Shared permission token with exponential backoff
//! - [`BackoffConfig`] - Backoff and circuit-breaker configuration
//! - [`BreakerState`] - Circuit breaker state reported in snapshots

mod backoff;
mod circuit_breaker;

pub use backoff::{BackoffConfig, BackoffManager};
pub use circuit_breaker::{AbortReason, BackoffSnapshot, BreakerState};
