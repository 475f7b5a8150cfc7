//! The capability every provider adapter implements.

use crate::error::Result;
use crate::result::ProviderResult;
use regscout_core::DomainName;
use std::fmt;

/// What an adapter consumes while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    /// Drives a browser session; counts against the session limiter.
    Browser,
    /// Plain network client; not capacity-limited.
    Api,
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Browser => f.write_str("browser"),
            Self::Api => f.write_str("api"),
        }
    }
}

/// One provider-specific lookup.
///
/// `check` may be slow and may never return; callers bound it with their
/// own timers. Implementations should release what they create before
/// returning, but the scheduler does not depend on it.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Resource class of this adapter.
    fn kind(&self) -> AdapterKind;

    /// Look up availability and pricing for `domain`.
    async fn check(&self, domain: &DomainName) -> Result<ProviderResult>;
}
