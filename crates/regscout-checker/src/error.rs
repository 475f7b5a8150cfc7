use regscout_core::ValidationError;
use thiserror::Error;

/// Errors raised before any check is scheduled.
///
/// Everything that happens after scheduling is reported inside a
/// `ProviderResult` instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl From<ValidationError> for CheckError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidQuery(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CheckError>;
