use crate::job::JobId;
use regscout_checker::CheckError;
use thiserror::Error;

/// Job queue errors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The job store could not be read or written
    #[error("job store unavailable: {0}")]
    Store(String),

    /// A stored job could not be decoded
    #[error("corrupt job {id}: {reason}")]
    Corrupt {
        /// Offending job
        id: String,
        /// What was wrong with it
        reason: String,
    },

    /// No job with this id
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// The job describes a check that can never run
    #[error(transparent)]
    Invalid(#[from] CheckError),

    /// Result serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}

/// Result type alias for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
