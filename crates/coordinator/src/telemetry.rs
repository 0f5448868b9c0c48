// Telemetry Module
//
// Installs the global tracing subscriber for binaries built on the
// coordinator: an env filter plus a console or file formatter.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// ============================================================================
// Telemetry Configuration
// ============================================================================

/// Configuration for log output
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Log filter (e.g., "info", "debug", "fetchwrite_coordinator=debug")
    pub log_filter: Option<String>,
    /// Append logs to this file instead of stderr
    pub log_file: Option<PathBuf>,
    /// Whether to emit ANSI colors (ignored for file output)
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: None,
            log_file: None,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    /// - `FETCHWRITE_LOG_FILE`: Write logs to this file
    pub fn from_env() -> Self {
        Self {
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok()),
            log_file: std::env::var("FETCHWRITE_LOG_FILE").ok().map(PathBuf::from),
            ansi: true,
        }
    }

    /// Build the env filter, falling back to `info`
    pub fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        match &self.log_filter {
            Some(filter) => EnvFilter::try_new(filter)
                .map_err(|e| TelemetryError::Filter(format!("{filter}: {e}"))),
            None => Ok(EnvFilter::new("info")),
        }
    }
}

/// Telemetry initialization errors
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Log filter could not be parsed
    #[error("invalid log filter {0}")]
    Filter(String),

    /// Log file could not be opened
    #[error("failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    /// A global subscriber is already installed
    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

// ============================================================================
// Initialization
// ============================================================================

/// Install the global tracing subscriber
///
/// # Example
///
/// ```ignore
/// use fetchwrite_coordinator::telemetry::{init_telemetry, TelemetryConfig};
///
/// fn main() -> anyhow::Result<()> {
///     init_telemetry(TelemetryConfig::from_env())?;
///     // ... your application code
///     Ok(())
/// }
/// ```
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = config.env_filter()?;

    let layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(filter)
                .boxed()
        }
        None => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_ansi(config.ansi)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    if let Some(path) = &config.log_file {
        tracing::debug!(path = %path.display(), "Logging to file");
    }
    Ok(())
}
