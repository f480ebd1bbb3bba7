//! Error types for the daemon.

use bastion_bulkhead::BulkheadError;
use bastion_degradation::DegradationError;
use bastion_observability::ObservabilityError;
use thiserror::Error;

/// Daemon errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration could not be loaded or is inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    /// Unknown component name in configuration or operator input
    #[error("unknown component: {0}")]
    UnknownComponent(String),

    /// Unknown degradation level in operator input
    #[error("unknown degradation level: {0}")]
    UnknownLevel(String),

    #[error(transparent)]
    Degradation(#[from] DegradationError),

    #[error(transparent)]
    Bulkhead(#[from] BulkheadError),

    #[error(transparent)]
    Observability(#[from] ObservabilityError),
}

impl From<config::ConfigError> for DaemonError {
    fn from(e: config::ConfigError) -> Self {
        DaemonError::Config(e.to_string())
    }
}

/// Result type for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
