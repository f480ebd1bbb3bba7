//! Bastion daemon library
//!
//! This module provides the pieces bastiond is assembled from:
//! - Layered configuration
//! - The guard context owning orchestrator, bulkhead and audit trail
//! - Background scheduler with injectable tickers

pub mod config;
pub mod context;
pub mod error;
pub mod scheduler;

pub use config::GuardConfig;
pub use context::{Collaborators, GuardContext};
pub use error::{DaemonError, DaemonResult};
pub use scheduler::{GuardScheduler, ManualTickers, Tickers};
