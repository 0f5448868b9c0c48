//! Worker pool for fetch/write processing
//!
//! This module provides:
//! - [`FetchWriteCoordinator`] - Worker pool with retries, write priority and termination detection
//! - [`WorkQueue`] - Thread-safe FIFO with atomic try-dequeue
//! - [`FetchItem`] / [`WriteItem`] - Work items carried by the queues
//! - [`ProcessSummary`] - Outcome counts of a run
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   FetchWriteCoordinator                      │
//! │                                                              │
//! │  initial_operation() ──► ┌──────────────┐                    │
//! │                          │  FetchQueue  │ ◄── retry(attempt+1)
//! │                          └──────┬───────┘                    │
//! │                                 │  BackoffManager gate       │
//! │                                 ▼                            │
//! │                          fetch_from_api()                    │
//! │                                 │ success                    │
//! │                                 ▼                            │
//! │                          ┌──────────────┐                    │
//! │                          │  WriteQueue  │  (always served    │
//! │                          └──────┬───────┘   before fetches)  │
//! │                                 ▼                            │
//! │                        write_fetched_data()                  │
//! │                                                              │
//! │  [worker 0] [worker 1] ... [worker max_threads-1]            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod coordinator;
mod item;
mod queue;
mod stats;

pub use coordinator::FetchWriteCoordinator;
pub use item::{FetchItem, WorkItem, WriteItem};
pub use queue::WorkQueue;
pub use stats::ProcessSummary;
