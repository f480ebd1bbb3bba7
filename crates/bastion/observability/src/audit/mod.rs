//! Audit trail for configuration changes, transitions and rejections
//!
//! Records are derived from domain events by [`AuditSubscriber`] and handed
//! to an append-only [`AuditSink`].

pub mod record;
pub mod sink;
pub mod subscriber;

pub use record::{AuditOutcome, AuditRecord};
pub use sink::{AuditSink, FileAuditSink, MemoryAuditSink, TracingAuditSink};
pub use subscriber::AuditSubscriber;
