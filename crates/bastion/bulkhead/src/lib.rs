//! Bastion Bulkhead - per-tenant concurrency isolation
//!
//! Bounds how many operations one tenant may run against a named resource,
//! queues a bounded number of excess callers in FIFO order and rejects the
//! rest, so one tenant's overload cannot starve the others.
//!
//! ```ignore
//! let ctx = BulkheadContext::new("tenant-a", "db").with_correlation_id(request_id);
//! match bulkhead.execute(&ctx, || run_query()).await {
//!     Ok(rows) => respond(rows),
//!     Err(e) if e.is_retryable() => too_many_requests(e.retry_after()),
//!     Err(e) => internal_error(e),
//! }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod registry;
pub mod semaphore;

pub use config::{BulkheadConfig, BulkheadSettings};
pub use error::{BulkheadError, RejectionReason, Result};
pub use registry::{BulkheadContext, TenantBulkhead, TenantBulkheadState};
pub use semaphore::{AcquireError, BulkheadPermit, BulkheadState, Semaphore};
