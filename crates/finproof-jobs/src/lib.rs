//! Job orchestration for finproof
//!
//! This crate owns the lifecycle of analysis jobs:
//!
//! - [`job`]: the job record, its status state machine and update types
//! - [`store`]: the [`JobStore`] persistence seam with in-memory and
//!   JSON-file implementations
//! - [`manager`]: [`JobManager`], the validated API for creating, querying and
//!   transitioning jobs
//! - [`executor`]: [`JobExecutor`], which claims pending jobs and runs them
//!   against the analyzer registry
//!
//! # Example
//!
//! ```no_run
//! use finproof_jobs::{InMemoryJobStore, JobManager};
//! use std::sync::Arc;
//!
//! # async fn demo() -> finproof_jobs::Result<()> {
//! let manager = JobManager::new(Arc::new(InMemoryJobStore::new()));
//! let id = manager.create_job("AAPL", "technical", None).await?;
//! assert!(manager.start_job(id).await?);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;
pub mod job;
pub mod manager;
pub mod store;

// Re-export key types
pub use error::{JobError, Result};
pub use executor::{BatchSummary, ExecutorConfig, JobExecutor, SymbolRunOutcome};
pub use job::{
    Job, JobCounts, JobFilter, JobId, JobStatus, JobUpdate, RetentionPolicy, StoredResult,
};
pub use manager::JobManager;
pub use store::{FileJobStore, InMemoryJobStore, JobStore};
