//! Monitored subsystems.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Logical subsystem whose health drives a degradation ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentId {
    Database,
    Auth,
    Billing,
    Audit,
    Api,
    Queue,
    Cache,
    External,
}

impl ComponentId {
    /// Every monitored component, in declaration order.
    pub const ALL: [ComponentId; 8] = [
        ComponentId::Database,
        ComponentId::Auth,
        ComponentId::Billing,
        ComponentId::Audit,
        ComponentId::Api,
        ComponentId::Queue,
        ComponentId::Cache,
        ComponentId::External,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentId::Database => "DATABASE",
            ComponentId::Auth => "AUTH",
            ComponentId::Billing => "BILLING",
            ComponentId::Audit => "AUDIT",
            ComponentId::Api => "API",
            ComponentId::Queue => "QUEUE",
            ComponentId::Cache => "CACHE",
            ComponentId::External => "EXTERNAL",
        }
    }

    /// Whether queue depth is a meaningful signal for this component.
    pub fn tracks_queue_depth(&self) -> bool {
        matches!(self, ComponentId::Queue)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known component.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown component: {0}")]
pub struct ParseComponentError(pub String);

impl FromStr for ComponentId {
    type Err = ParseComponentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentId::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseComponentError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_parse_is_case_insensitive() {
        assert_eq!("database".parse::<ComponentId>(), Ok(ComponentId::Database));
        assert_eq!(" QUEUE ".parse::<ComponentId>(), Ok(ComponentId::Queue));
        assert!("storage".parse::<ComponentId>().is_err());
    }

    #[test]
    fn test_component_serializes_screaming_case() {
        let json = serde_json::to_string(&ComponentId::External).unwrap();
        assert_eq!(json, "\"EXTERNAL\"");
    }

    #[test]
    fn test_only_queue_tracks_depth() {
        let tracking: Vec<_> = ComponentId::ALL
            .into_iter()
            .filter(|c| c.tracks_queue_depth())
            .collect();
        assert_eq!(tracking, vec![ComponentId::Queue]);
    }
}
