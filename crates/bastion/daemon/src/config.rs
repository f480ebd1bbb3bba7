//! Configuration for bastiond
//!
//! Layered as defaults, then an optional file, then `BASTION_*` environment
//! variables (`__` separates nested keys, e.g.
//! `BASTION_SCHEDULER__ASSESSMENT_INTERVAL_SECS=10`).

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use bastion_bulkhead::{BulkheadConfig, BulkheadSettings};
use bastion_degradation::{ComponentPolicy, DegradationConfig, PolicyPatch};
use bastion_types::ComponentId;
use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, DaemonResult};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Sample sizing and retention
    #[serde(default)]
    pub degradation: DegradationConfig,

    /// Which components are monitored and how their policies differ
    #[serde(default)]
    pub components: ComponentsConfig,

    /// Tenant bulkhead limits
    #[serde(default)]
    pub bulkhead: BulkheadSection,

    /// Background task periods
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Audit trail destination
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Monitored components and per-component policy overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentsConfig {
    /// Component names; case-insensitive
    #[serde(default = "default_monitored")]
    pub monitored: Vec<String>,

    /// Patches merged over the built-in policy, keyed by component name
    #[serde(default)]
    pub overrides: HashMap<String, PolicyPatch>,
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            monitored: default_monitored(),
            overrides: HashMap::new(),
        }
    }
}

impl ComponentsConfig {
    /// Resolve names into complete policies.
    pub fn policies(&self) -> DaemonResult<Vec<ComponentPolicy>> {
        let mut policies: Vec<ComponentPolicy> = Vec::new();
        for name in &self.monitored {
            let component = parse_component(name)?;
            if policies.iter().any(|p| p.component == component) {
                continue;
            }
            policies.push(ComponentPolicy::default_for(component));
        }

        for (name, patch) in &self.overrides {
            let component = parse_component(name)?;
            let policy = policies
                .iter_mut()
                .find(|p| p.component == component)
                .ok_or_else(|| {
                    DaemonError::Config(format!("override for unmonitored component {}", name))
                })?;
            policy.apply_patch(patch);
        }

        policies.sort_by_key(|p| p.component);
        Ok(policies)
    }
}

/// Bulkhead settings plus eviction TTL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkheadSection {
    /// Limits for resources without an override
    #[serde(default)]
    pub default: BulkheadConfig,

    /// Per-resource limits, keyed by lower-case resource name
    #[serde(default)]
    pub resources: HashMap<String, BulkheadConfig>,

    /// Idle time after which a tenant's bulkhead is dropped
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,
}

impl Default for BulkheadSection {
    fn default() -> Self {
        Self {
            default: BulkheadConfig::default(),
            resources: HashMap::new(),
            idle_ttl_secs: default_idle_ttl(),
        }
    }
}

impl BulkheadSection {
    pub fn settings(&self) -> BulkheadSettings {
        BulkheadSettings {
            default: self.default,
            resources: self.resources.clone(),
        }
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Metric collection and system assessment interval in seconds
    #[serde(default = "default_assessment_interval")]
    pub assessment_interval_secs: u64,

    /// Recovery sweep interval in seconds
    #[serde(default = "default_recovery_interval")]
    pub recovery_interval_secs: u64,

    /// Sample pruning interval in seconds
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,

    /// Idle bulkhead eviction interval in seconds
    #[serde(default = "default_eviction_interval")]
    pub eviction_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            assessment_interval_secs: default_assessment_interval(),
            recovery_interval_secs: default_recovery_interval(),
            prune_interval_secs: default_prune_interval(),
            eviction_interval_secs: default_eviction_interval(),
        }
    }
}

/// Audit trail destination
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuditConfig {
    /// Emit records on the `bastion::audit` tracing target
    #[default]
    Tracing,

    /// Keep records in memory (for development/testing)
    Memory,

    /// Append JSON lines to a file
    File {
        /// Log file path
        path: PathBuf,
    },
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_monitored() -> Vec<String> {
    ComponentId::ALL.iter().map(|c| c.to_string()).collect()
}

fn default_idle_ttl() -> u64 {
    300
}

fn default_assessment_interval() -> u64 {
    30
}

fn default_recovery_interval() -> u64 {
    60
}

fn default_prune_interval() -> u64 {
    300
}

fn default_eviction_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Parse a component name, case-insensitively.
pub fn parse_component(name: &str) -> DaemonResult<ComponentId> {
    ComponentId::from_str(name).map_err(|_| DaemonError::UnknownComponent(name.to_string()))
}

impl GuardConfig {
    /// Load configuration from file and environment
    pub fn load(path: Option<&str>) -> DaemonResult<Self> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&GuardConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with BASTION_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("BASTION")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: GuardConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency before anything is started.
    pub fn validate(&self) -> DaemonResult<()> {
        self.degradation.validate()?;
        self.bulkhead.settings().validate()?;
        self.components.policies()?;

        let scheduler = &self.scheduler;
        for (name, secs) in [
            ("assessment_interval_secs", scheduler.assessment_interval_secs),
            ("recovery_interval_secs", scheduler.recovery_interval_secs),
            ("prune_interval_secs", scheduler.prune_interval_secs),
            ("eviction_interval_secs", scheduler.eviction_interval_secs),
        ] {
            if secs == 0 {
                return Err(DaemonError::Config(format!("scheduler.{} must be positive", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_types::DegradationLevel;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GuardConfig::default();
        assert_eq!(config.components.monitored.len(), 8);
        assert_eq!(config.scheduler.assessment_interval_secs, 30);
        assert_eq!(config.scheduler.recovery_interval_secs, 60);
        assert!(matches!(config.audit, AuditConfig::Tracing));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_merge_into_defaults() {
        let mut components = ComponentsConfig {
            monitored: vec!["database".into(), "Api".into(), "DATABASE".into()],
            overrides: HashMap::new(),
        };
        components.overrides.insert(
            "database".into(),
            PolicyPatch::new().auto_recovery(false).max_retries(2),
        );

        let policies = components.policies().unwrap();

        assert_eq!(policies.len(), 2);
        assert_eq!(policies[0].component, ComponentId::Database);
        assert!(!policies[0].recovery.auto_recovery);
        assert_eq!(policies[0].recovery.max_retries, 2);
        assert!(policies[1].recovery.auto_recovery);
    }

    #[test]
    fn test_unknown_component_rejected() {
        let components = ComponentsConfig {
            monitored: vec!["mainframe".into()],
            overrides: HashMap::new(),
        };
        assert!(matches!(
            components.policies(),
            Err(DaemonError::UnknownComponent(name)) if name == "mainframe"
        ));
    }

    #[test]
    fn test_override_for_unmonitored_component_rejected() {
        let mut components = ComponentsConfig {
            monitored: vec!["cache".into()],
            overrides: HashMap::new(),
        };
        components
            .overrides
            .insert("billing".into(), PolicyPatch::new().max_retries(1));

        assert!(matches!(components.policies(), Err(DaemonError::Config(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = GuardConfig::default();
        config.scheduler.prune_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bastion.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[scheduler]
assessment_interval_secs = 5

[bulkhead]
idle_ttl_secs = 30

[bulkhead.default]
max_concurrent = 4
queue_max_depth = 0
acquire_timeout_ms = 250

[components]
monitored = ["DATABASE", "QUEUE"]

[components.overrides.queue.notification]
enabled = true
min_level = "MINIMAL"
channels = ["pager"]

[audit]
type = "memory"
"#
        )
        .unwrap();

        let config = GuardConfig::load(path.to_str()).unwrap();

        assert_eq!(config.scheduler.assessment_interval_secs, 5);
        assert_eq!(config.scheduler.recovery_interval_secs, 60);
        assert_eq!(config.bulkhead.default.max_concurrent, 4);
        assert_eq!(
            config.bulkhead.default.acquire_timeout,
            Duration::from_millis(250)
        );
        assert_eq!(config.bulkhead.idle_ttl(), Duration::from_secs(30));
        assert!(matches!(config.audit, AuditConfig::Memory));

        let policies = config.components.policies().unwrap();
        assert_eq!(policies.len(), 2);
        assert_eq!(
            policies[1].notification.min_level,
            DegradationLevel::Minimal
        );
    }
}
