//! Error types for tenant bulkheads.

use std::fmt;
use std::time::Duration;

use bastion_types::TenantId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why admission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Every slot busy and the wait queue at its bound.
    QueueFull,
    /// Queued, but no slot freed within the acquire timeout.
    Timeout,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::QueueFull => "queue_full",
            RejectionReason::Timeout => "timeout",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by bulkhead admission and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BulkheadError {
    /// Admission refused; the operation never ran.
    #[error("bulkhead rejected {tenant_id}/{resource}: {reason}")]
    Rejected {
        tenant_id: TenantId,
        resource: String,
        reason: RejectionReason,
        retry_after: Duration,
    },

    /// Configuration that can never admit anything.
    #[error("invalid bulkhead configuration: {0}")]
    InvalidConfig(String),
}

impl BulkheadError {
    /// Rejections are transient backpressure; bad config is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BulkheadError::Rejected { .. })
    }

    /// Suggested wait before retrying, for 429/503-style responses.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            BulkheadError::Rejected { retry_after, .. } => Some(*retry_after),
            BulkheadError::InvalidConfig(_) => None,
        }
    }

    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match self {
            BulkheadError::Rejected { reason, .. } => Some(*reason),
            BulkheadError::InvalidConfig(_) => None,
        }
    }
}

/// Result type for bulkhead operations.
pub type Result<T, E = BulkheadError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_is_retryable() {
        let err = BulkheadError::Rejected {
            tenant_id: TenantId::new("t1"),
            resource: "db".into(),
            reason: RejectionReason::QueueFull,
            retry_after: Duration::from_millis(250),
        };

        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_millis(250)));
        assert_eq!(err.to_string(), "bulkhead rejected t1/db: queue_full");
    }

    #[test]
    fn test_invalid_config_is_not_retryable() {
        let err = BulkheadError::InvalidConfig("max_concurrent must be at least 1".into());
        assert!(!err.is_retryable());
        assert!(err.retry_after().is_none());
    }
}
