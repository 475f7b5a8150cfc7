//! Error types for provider adapters.

use regscout_core::ProviderId;
use thiserror::Error;

/// Errors an adapter may return instead of a `ProviderResult`.
///
/// The task runner turns every variant into an `ok: false` result whose
/// `error` is this error's display text, so messages are written for end
/// users.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network failure talking to the provider
    #[error("network error: {0}")]
    Network(String),

    /// Provider answered with an unexpected HTTP status
    #[error("provider returned HTTP {status}")]
    HttpStatus {
        /// Status code received
        status: u16,
    },

    /// Provider blocked or challenged the request
    #[error("blocked by provider: {0}")]
    Blocked(String),

    /// Provider does not sell this TLD
    #[error("unsupported TLD: .{0}")]
    UnsupportedTld(String),

    /// Provider response could not be interpreted
    #[error("could not parse provider response: {0}")]
    Parse(String),

    /// Browser session could not be used
    #[error("browser session error: {0}")]
    Session(String),

    /// No adapter registered for the provider
    #[error("no adapter registered for provider {0}")]
    NotRegistered(ProviderId),
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
