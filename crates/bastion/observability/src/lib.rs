//! Bastion Observability
//!
//! Decouples side effects from the degradation and bulkhead state machines.
//!
//! ## Features
//!
//! - **Event bus**: non-blocking broadcast of [`GuardEventEnvelope`]s
//! - **Audit**: records derived from events, written by a background subscriber
//! - **Tracing**: `tracing-subscriber` initialization shared by binaries

pub mod audit;
pub mod bus;
pub mod error;
pub mod tracing;

pub use audit::{
    AuditOutcome, AuditRecord, AuditSink, AuditSubscriber, FileAuditSink, MemoryAuditSink,
    TracingAuditSink,
};
pub use bus::EventBus;
pub use error::{ObservabilityError, Result};
pub use self::tracing::{init_tracing, TracingConfig};

pub use bastion_types::GuardEventEnvelope;
