//! Domain events emitted by the degradation engine and the bulkheads.
//!
//! Core logic only publishes events; persistence (audit) and alert fan-out
//! are subscribers and never sit on the protected path.

use crate::{AlertId, ComponentId, DegradationLevel, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Envelope wrapping every Bastion event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardEventEnvelope {
    /// Unique event ID
    pub id: Uuid,

    /// Event timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Subsystem that produced the event
    pub source: EventSource,

    /// Event severity
    pub severity: EventSeverity,

    /// Tenant the event concerns, if any
    pub tenant_id: Option<TenantId>,

    /// Actor who triggered the event
    pub actor: Option<String>,

    /// Correlation ID for tracing
    pub correlation_id: Option<String>,

    /// Free-form context
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// The actual event
    pub event: GuardEvent,
}

impl GuardEventEnvelope {
    /// Wrap an event, deriving source and severity from it.
    pub fn new(event: GuardEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            source: event.source(),
            severity: event.severity(),
            tenant_id: None,
            actor: None,
            correlation_id: None,
            metadata: HashMap::new(),
            event,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata.extend(metadata);
        self
    }
}

/// Event sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// Degradation orchestrator
    Degradation,
    /// Tenant bulkhead
    Bulkhead,
    /// Operator surface
    Operator,
}

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSeverity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl EventSeverity {
    /// Severity of a move onto the given rung.
    pub fn for_level(level: DegradationLevel) -> Self {
        match level {
            DegradationLevel::None => EventSeverity::Info,
            DegradationLevel::ReadOnly => EventSeverity::Low,
            DegradationLevel::Partial => EventSeverity::Medium,
            DegradationLevel::Minimal => EventSeverity::High,
            DegradationLevel::Emergency => EventSeverity::Critical,
        }
    }
}

/// Snapshot of a bulkhead at the moment it turned a caller away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkheadRejection {
    pub tenant_id: TenantId,
    pub resource: String,
    pub reason: String,
    pub in_flight: usize,
    pub queue_depth: usize,
    pub max_concurrent: usize,
    pub queue_max_depth: usize,
}

/// Bastion events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuardEvent {
    // ═══════════════════════════════════════════════════════════════════
    // DEGRADATION EVENTS
    // ═══════════════════════════════════════════════════════════════════
    /// Component policy merged with an operator patch
    PolicyConfigured {
        component: ComponentId,
        changed_fields: Vec<String>,
    },

    /// Assessment moved a component to a new rung
    LevelChanged {
        component: ComponentId,
        from: DegradationLevel,
        to: DegradationLevel,
        reason: String,
        mitigations: Vec<String>,
    },

    /// Operator pinned a component to a rung
    DegradationForced {
        component: ComponentId,
        from: DegradationLevel,
        to: DegradationLevel,
        reason: String,
    },

    /// Component returned to `None`
    ComponentRecovered {
        component: ComponentId,
        from: DegradationLevel,
    },

    /// A mitigation could not be applied or lifted
    MitigationFailed {
        component: ComponentId,
        level: DegradationLevel,
        error: String,
    },

    /// Notification policy raised an alert
    AlertRaised {
        alert_id: AlertId,
        component: ComponentId,
        level: DegradationLevel,
        channels: Vec<String>,
    },

    /// Alert condition no longer holds
    AlertCleared {
        alert_id: AlertId,
        component: ComponentId,
    },

    // ═══════════════════════════════════════════════════════════════════
    // BULKHEAD EVENTS
    // ═══════════════════════════════════════════════════════════════════
    /// Admission refused (queue full or acquire timeout)
    BulkheadRejected(BulkheadRejection),
}

impl GuardEvent {
    pub fn source(&self) -> EventSource {
        match self {
            GuardEvent::BulkheadRejected(_) => EventSource::Bulkhead,
            GuardEvent::PolicyConfigured { .. } | GuardEvent::DegradationForced { .. } => {
                EventSource::Operator
            }
            _ => EventSource::Degradation,
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            GuardEvent::PolicyConfigured { .. } => EventSeverity::Low,
            GuardEvent::LevelChanged { to, .. } => EventSeverity::for_level(*to),
            GuardEvent::DegradationForced { .. } => EventSeverity::High,
            GuardEvent::ComponentRecovered { .. } => EventSeverity::Info,
            GuardEvent::MitigationFailed { .. } => EventSeverity::High,
            GuardEvent::AlertRaised { level, .. } => EventSeverity::for_level(*level),
            GuardEvent::AlertCleared { .. } => EventSeverity::Info,
            GuardEvent::BulkheadRejected(_) => EventSeverity::High,
        }
    }

    /// Stable action name used for audit records.
    pub fn action(&self) -> &'static str {
        match self {
            GuardEvent::PolicyConfigured { .. } => "degradation.configure",
            GuardEvent::LevelChanged { .. } => "degradation.transition",
            GuardEvent::DegradationForced { .. } => "degradation.force",
            GuardEvent::ComponentRecovered { .. } => "degradation.recover",
            GuardEvent::MitigationFailed { .. } => "degradation.mitigation_failed",
            GuardEvent::AlertRaised { .. } => "alert.raise",
            GuardEvent::AlertCleared { .. } => "alert.clear",
            GuardEvent::BulkheadRejected(_) => "bulkhead.reject",
        }
    }

    /// Identifier of the resource the event concerns.
    pub fn resource_id(&self) -> String {
        match self {
            GuardEvent::PolicyConfigured { component, .. }
            | GuardEvent::LevelChanged { component, .. }
            | GuardEvent::DegradationForced { component, .. }
            | GuardEvent::ComponentRecovered { component, .. }
            | GuardEvent::MitigationFailed { component, .. }
            | GuardEvent::AlertRaised { component, .. }
            | GuardEvent::AlertCleared { component, .. } => component.to_string(),
            GuardEvent::BulkheadRejected(rejection) => {
                format!("{}/{}", rejection.tenant_id, rejection.resource)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_is_high_severity() {
        let event = GuardEvent::BulkheadRejected(BulkheadRejection {
            tenant_id: TenantId::new("t1"),
            resource: "db".into(),
            reason: "queue_full".into(),
            in_flight: 2,
            queue_depth: 0,
            max_concurrent: 2,
            queue_max_depth: 0,
        });
        let envelope = GuardEventEnvelope::new(event);
        assert_eq!(envelope.severity, EventSeverity::High);
        assert_eq!(envelope.source, EventSource::Bulkhead);
        assert_eq!(envelope.event.resource_id(), "t1/db");
    }

    #[test]
    fn test_transition_severity_tracks_target_level() {
        let event = GuardEvent::LevelChanged {
            component: ComponentId::Api,
            from: DegradationLevel::None,
            to: DegradationLevel::Emergency,
            reason: "cpu".into(),
            mitigations: vec![],
        };
        assert_eq!(event.severity(), EventSeverity::Critical);
        assert_eq!(event.action(), "degradation.transition");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = GuardEvent::ComponentRecovered {
            component: ComponentId::Cache,
            from: DegradationLevel::Partial,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "component_recovered");
        assert_eq!(json["component"], "CACHE");
    }
}
