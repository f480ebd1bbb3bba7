//! Runtime state tracked per component and for the system as a whole.

use std::collections::{BTreeMap, VecDeque};

use bastion_types::{AlertId, ComponentId, DegradationLevel, MetricSample, MetricSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::policy::Mitigation;

/// What caused a level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTrigger {
    Assessment,
    Forced,
    Recovery,
}

/// One entry in a component's transition history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: DegradationLevel,
    pub to: DegradationLevel,
    pub trigger: TransitionTrigger,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Mutable state of one component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentState {
    pub component: ComponentId,
    pub level: DegradationLevel,

    /// Pinned by an operator; assessment may raise but never lower it and
    /// recovery sweeps skip it.
    pub forced: bool,

    pub last_transition_at: Option<DateTime<Utc>>,
    pub degraded_since: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub(crate) degraded_at: Option<Instant>,

    pub transition_count: u64,
    pub recovery_attempts: u32,

    /// Average of the last `healthy_window` samples (5 by default) seen by
    /// the latest assessment.
    pub latest_metrics: MetricSnapshot,

    pub active_mitigations: Vec<Mitigation>,
    pub history: VecDeque<TransitionRecord>,
}

impl ComponentState {
    pub fn new(component: ComponentId) -> Self {
        Self {
            component,
            level: DegradationLevel::None,
            forced: false,
            last_transition_at: None,
            degraded_since: None,
            degraded_at: None,
            transition_count: 0,
            recovery_attempts: 0,
            latest_metrics: MetricSnapshot::zero(),
            active_mitigations: Vec::new(),
            history: VecDeque::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.level.is_degraded()
    }

    /// Time spent since the most recent move onto a degraded rung.
    pub fn degraded_for(&self, now: Instant) -> Option<std::time::Duration> {
        self.degraded_at
            .map(|at| now.saturating_duration_since(at))
    }

    /// Move to `to` and keep bookkeeping consistent.
    ///
    /// Returning to `None` clears the forced flag and the retry counter.
    pub(crate) fn transition(
        &mut self,
        to: DegradationLevel,
        trigger: TransitionTrigger,
        reason: String,
        mitigations: Vec<Mitigation>,
        now: Instant,
        history_capacity: usize,
    ) -> TransitionRecord {
        let at = Utc::now();
        let record = TransitionRecord {
            from: self.level,
            to,
            trigger,
            reason,
            at,
        };

        self.level = to;
        self.last_transition_at = Some(at);
        self.transition_count += 1;
        self.active_mitigations = mitigations;

        if to.is_degraded() {
            self.degraded_at = Some(now);
            if !record.from.is_degraded() {
                self.degraded_since = Some(at);
            }
        } else {
            self.degraded_at = None;
            self.degraded_since = None;
            self.forced = false;
            self.recovery_attempts = 0;
        }

        if history_capacity > 0 {
            if self.history.len() == history_capacity {
                self.history.pop_front();
            }
            self.history.push_back(record.clone());
        }

        record
    }
}

/// An open notification for a degraded component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub component: ComponentId,
    pub level: DegradationLevel,
    pub message: String,
    pub channels: Vec<String>,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub(crate) fn message_for(component: ComponentId, level: DegradationLevel) -> String {
        format!("{} degraded to {}", component, level)
    }
}

/// Aggregate view produced by a system-wide assessment pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    /// Highest level across configured components.
    pub overall_level: DegradationLevel,
    pub components: BTreeMap<ComponentId, DegradationLevel>,
    pub total_transitions: u64,
    pub active_alerts: Vec<Alert>,
    pub assessed_at: Option<DateTime<Utc>>,
}

impl SystemState {
    pub fn degraded_components(&self) -> Vec<ComponentId> {
        self.components
            .iter()
            .filter(|(_, level)| level.is_degraded())
            .map(|(component, _)| *component)
            .collect()
    }
}

/// Metric view of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMetrics {
    pub level: DegradationLevel,
    pub sample_count: usize,
    pub latest: Option<MetricSample>,
    pub window_average: MetricSnapshot,
}

/// Metric view across all configured components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub components: BTreeMap<ComponentId, ComponentMetrics>,
    pub collected_at: DateTime<Utc>,
}
