//! Error types for job orchestration

use crate::job::{JobId, JobStatus};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, JobError>;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {id}: illegal transition {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("failing a job requires a non-empty error message")]
    MissingErrorMessage,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("job store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] finproof_core::Error),
}
