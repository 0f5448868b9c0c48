//! Run counters
//!
//! Workers bump lock-free counters while they run; `process()` turns them into
//! a [`ProcessSummary`] at the end.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_secs;
use crate::reliability::BackoffSnapshot;

#[derive(Debug, Default)]
pub(crate) struct ProcessStats {
    attempts: AtomicU64,
    retries: AtomicU64,
    written: AtomicU64,
    definitive_failures: AtomicU64,
    aborted: AtomicU64,
}

impl ProcessStats {
    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_definitive_failure(&self) {
        self.definitive_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_aborted(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn summary(
        &self,
        requests: usize,
        elapsed: Duration,
        backoff: BackoffSnapshot,
    ) -> ProcessSummary {
        ProcessSummary {
            requests: requests as u64,
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            definitive_failures: self.definitive_failures.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            elapsed,
            backoff,
        }
    }
}

/// Outcome counts of one `process()` run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessSummary {
    /// Requests seeded by the initial operation
    pub requests: u64,
    /// API calls made
    pub attempts: u64,
    /// Failed attempts put back on the fetch queue
    pub retries: u64,
    /// Responses persisted
    pub written: u64,
    pub definitive_failures: u64,
    pub aborted: u64,
    #[serde(rename = "elapsed_seconds", with = "duration_secs")]
    pub elapsed: Duration,
    /// Limiter state when the run finished
    pub backoff: BackoffSnapshot,
}

impl ProcessSummary {
    /// Requests that reached a terminal outcome
    pub fn completed(&self) -> u64 {
        self.written + self.definitive_failures + self.aborted
    }
}
