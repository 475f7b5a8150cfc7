use regscout_core::ProviderId;
use thiserror::Error;

/// Errors raised while turning provider configuration into adapters.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("provider '{provider}': invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        provider: ProviderId,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("provider '{provider}': invalid selector '{selector}'")]
    InvalidSelector {
        provider: ProviderId,
        selector: String,
    },

    #[error("provider '{provider}': {reason}")]
    InvalidTemplate { provider: ProviderId, reason: String },

    #[error("failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
