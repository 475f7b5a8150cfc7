//! Core error types for regscout.
//!
//! Validation and configuration failures live here because every other
//! crate needs to report them the same way.

use thiserror::Error;

/// Errors raised while validating shared domain types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The domain string is not a syntactically valid FQDN
    #[error("invalid domain '{domain}': {reason}")]
    InvalidDomain {
        /// Domain as supplied by the caller
        domain: String,
        /// What made it invalid
        reason: String,
    },

    /// The provider identifier is not part of the known registry
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
