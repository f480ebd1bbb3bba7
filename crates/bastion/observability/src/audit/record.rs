//! Audit record types

use bastion_types::{EventSeverity, GuardEvent, GuardEventEnvelope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Actor recorded when an event carries none.
pub const SYSTEM_ACTOR: &str = "system";

/// An audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique entry ID (the originating event's ID)
    pub id: Uuid,

    /// Timestamp of the event
    pub timestamp: DateTime<Utc>,

    /// Tenant the action concerned, if any
    pub tenant_id: Option<String>,

    /// Actor who performed the action
    pub actor_id: String,

    /// Action performed, e.g. `degradation.transition`
    pub action: String,

    /// Resource affected
    pub resource_id: String,

    /// Outcome of the action
    pub outcome: AuditOutcome,

    /// Event severity
    pub severity: EventSeverity,

    /// Correlation ID for tracing
    pub correlation_id: Option<String>,

    /// Additional context/details
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AuditRecord {
    /// Derive a record from a published event.
    pub fn from_envelope(envelope: &GuardEventEnvelope) -> Self {
        let mut metadata = envelope.metadata.clone();
        if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(&envelope.event) {
            for (key, value) in fields {
                if key != "type" {
                    metadata.entry(key).or_insert(value);
                }
            }
        }

        Self {
            id: envelope.id,
            timestamp: envelope.timestamp,
            tenant_id: envelope.tenant_id.as_ref().map(|t| t.to_string()),
            actor_id: envelope
                .actor
                .clone()
                .unwrap_or_else(|| SYSTEM_ACTOR.to_string()),
            action: envelope.event.action().to_string(),
            resource_id: envelope.event.resource_id(),
            outcome: AuditOutcome::for_event(&envelope.event),
            severity: envelope.severity,
            correlation_id: envelope.correlation_id.clone(),
            metadata,
        }
    }
}

/// Outcome of an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure { reason: String },
    Denied { reason: String },
}

impl AuditOutcome {
    fn for_event(event: &GuardEvent) -> Self {
        match event {
            GuardEvent::BulkheadRejected(rejection) => AuditOutcome::Denied {
                reason: rejection.reason.clone(),
            },
            GuardEvent::MitigationFailed { error, .. } => AuditOutcome::Failure {
                reason: error.clone(),
            },
            _ => AuditOutcome::Success,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AuditOutcome::Success)
    }
}
