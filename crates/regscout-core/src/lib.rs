//! regscout Core - Foundation crate for the regscout domain checker.
//!
//! This crate provides shared types, error handling and configuration
//! management that all other regscout crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Validation and configuration errors using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Validated newtypes and enums (`DomainName`, `ProviderId`)
//!
//! # Example
//!
//! ```rust
//! use regscout_core::{AppConfig, DomainName, ProviderId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.browser.max_concurrent_sessions, 8);
//!
//! let domain = DomainName::parse(" Example.Tech ")?;
//! assert_eq!(domain.as_str(), "example.tech");
//!
//! let provider: ProviderId = "porkbun".parse()?;
//! assert_eq!(provider, ProviderId::Porkbun);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserConfig, BrowserPageSource, CacheConfig, CheckingConfig, HttpJsonSource,
    ProviderConfig, ProviderSource, QueueConfig, StorageConfig, StoreBackend,
};
pub use error::{ConfigError, ConfigResult, ValidationError};
pub use types::{DomainName, ProviderId};
