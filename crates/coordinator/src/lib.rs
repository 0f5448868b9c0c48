//! # Fetch/Write Coordinator
//!
//! A worker pool for pulling data out of a rate-sensitive remote API and
//! persisting it, slowing down while the API is unhealthy and giving up once
//! an outage lasts too long.
//!
//! ## Features
//!
//! - **Single permission token**: at most one API call per `current_delay`, whatever the pool size
//! - **Adaptive backoff**: the delay grows on every failure and resets on the first success
//! - **Circuit breaker**: requests are aborted once a backoff episode outlasts its limit
//! - **Bounded retries**: each request gets `max_attempts_per_request` attempts
//! - **Write priority**: pending writes are always drained before new fetches start
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   FetchWriteCoordinator                      │
//! │  (worker pool, retries, write priority, termination)        │
//! └─────────────────────────────────────────────────────────────┘
//!               │                               │
//!               ▼                               ▼
//! ┌───────────────────────────┐   ┌───────────────────────────┐
//! │      BackoffManager       │   │      OperationModel       │
//! │ (permission token, delay, │   │ (fetch, judge, write,     │
//! │  circuit breaker)         │   │  failure callbacks)       │
//! └───────────────────────────┘   └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use fetchwrite_coordinator::prelude::*;
//!
//! struct Prices { client: PriceClient, store: PriceStore }
//!
//! impl OperationModel for Prices {
//!     type RequestArg = String;
//!     type Response = Result<Quote, ApiError>;
//!
//!     fn initial_operation(&self) -> Vec<String> { self.client.symbols() }
//!     fn fetch_from_api(&self, symbol: &String) -> Self::Response { self.client.quote(symbol) }
//!     fn response_succeeded(&self, response: &Self::Response) -> bool { response.is_ok() }
//!     fn write_fetched_data(&self, symbol: String, response: Self::Response) {
//!         self.store.save(&symbol, response.unwrap());
//!     }
//! }
//!
//! let prices = Prices::connect()?;
//! let mut coordinator = FetchWriteCoordinator::new(CoordinatorConfig::from_env(), &prices)?;
//! let summary = coordinator.process()?;
//! ```

pub mod config;
pub mod error;
pub mod operation;
pub mod reliability;
pub mod telemetry;
pub mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::{ConfigError, CoordinatorConfig};
    pub use crate::error::CoordinatorError;
    pub use crate::operation::OperationModel;
    pub use crate::reliability::{AbortReason, BackoffConfig, BackoffManager, BreakerState};
    pub use crate::worker::{FetchWriteCoordinator, ProcessSummary};
}

// Re-export key types at crate root
pub use config::{ConfigError, CoordinatorConfig};
pub use error::CoordinatorError;
pub use operation::OperationModel;
pub use reliability::{AbortReason, BackoffConfig, BackoffManager, BackoffSnapshot, BreakerState};
pub use worker::{FetchItem, FetchWriteCoordinator, ProcessSummary, WorkItem, WorkQueue, WriteItem};
