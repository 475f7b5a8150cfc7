//! Error types for cache stores.

use thiserror::Error;

/// Errors raised by a cache store.
///
/// `ResultCache` never propagates these; it logs them and behaves as if
/// the entry were absent.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store could not be reached or failed the operation
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be encoded or decoded
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
