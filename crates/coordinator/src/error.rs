//! Coordinator errors
//!
//! Request outcomes (retries, definitive failures, aborts) are reported through
//! the [`OperationModel`](crate::OperationModel) callbacks, never through these
//! types. A [`CoordinatorError`] means the run itself could not start or did
//! not finish cleanly.

use crate::config::ConfigError;

/// Coordinator errors
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// Configuration rejected before the run started
    #[error("invalid coordinator configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// A worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// One or more workers panicked; the remaining workers were stopped
    #[error("{workers} worker thread(s) panicked, run aborted")]
    WorkerPanicked { workers: usize },
}
