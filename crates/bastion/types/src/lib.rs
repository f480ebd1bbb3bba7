//! Bastion Types - Core vocabulary for cascading-failure protection
//!
//! Bastion keeps a multi-tenant service standing when parts of it are
//! struggling. Two mechanisms share the types in this crate:
//!
//! - **Degradation engine**: watches five metric dimensions per logical
//!   component and walks a severity ladder from `None` to `Emergency`.
//! - **Tenant bulkhead**: bounds concurrent work per (tenant, resource) so one
//!   tenant's overload cannot starve the rest.
//!
//! ## Key Concepts
//!
//! - **ComponentId**: the fixed set of monitored subsystems
//! - **DegradationLevel**: totally ordered severity rungs
//! - **MetricSnapshot**: one reading of the five metric dimensions
//! - **GuardEvent**: domain events consumed by audit and alerting subscribers

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod component;
pub mod duration_ms;
pub mod events;
pub mod ids;
pub mod level;
pub mod metrics;

pub use component::{ComponentId, ParseComponentError};
pub use events::{
    BulkheadRejection, EventSeverity, EventSource, GuardEvent, GuardEventEnvelope,
};
pub use ids::{AlertId, TenantId};
pub use level::{DegradationLevel, ParseLevelError};
pub use metrics::{MetricDimension, MetricSample, MetricSnapshot};
