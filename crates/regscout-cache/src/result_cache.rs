//! Read-through/write-through cache of provider results.

use crate::store::CacheStore;
use regscout_core::{DomainName, ProviderId};
use regscout_provider::ProviderResult;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Standard time-to-live of a cached result.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cache key for one provider's answer about one domain.
///
/// Renders as `<provider>:<normalized-domain>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    provider: ProviderId,
    domain: DomainName,
}

impl CacheKey {
    /// Build a key. `DomainName` is already normalized.
    #[must_use]
    pub fn new(provider: ProviderId, domain: DomainName) -> Self {
        Self { provider, domain }
    }

    /// The provider half of the key.
    #[must_use]
    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    /// The domain half of the key.
    #[must_use]
    pub fn domain(&self) -> &DomainName {
        &self.domain
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider.as_str(), self.domain)
    }
}

/// Typed view over a [`CacheStore`].
///
/// Store failures never reach callers: reads degrade to a miss and writes
/// are dropped, both with a warning.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl ResultCache {
    /// Cache over `store` with entries living for `ttl`.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Entry lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live result.
    pub async fn get(&self, key: &CacheKey) -> Option<ProviderResult> {
        let raw = match self.store.get(&key.to_string()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, "CacheUnavailable on read, continuing uncached: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(result) => {
                debug!(key = %key, "cache hit");
                Some(result)
            }
            Err(e) => {
                warn!(key = %key, "discarding undecodable cache entry: {}", e);
                None
            }
        }
    }

    /// Store a result, replacing any previous one. Returns whether the write
    /// reached the store.
    pub async fn put(&self, key: &CacheKey, result: &ProviderResult) -> bool {
        let raw = match serde_json::to_string(result) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, "could not encode result for cache: {}", e);
                return false;
            }
        };

        match self.store.set(&key.to_string(), raw, self.ttl).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, "CacheUnavailable on write, result not cached: {}", e);
                false
            }
        }
    }

    /// Drop a cached result.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        match self.store.delete(&key.to_string()).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!(key = %key, "CacheUnavailable on delete: {}", e);
                false
            }
        }
    }

    /// Remove expired entries from the store.
    pub async fn purge_expired(&self) -> u64 {
        match self.store.purge_expired().await {
            Ok(purged) => {
                debug!(purged, "purged expired cache entries");
                purged
            }
            Err(e) => {
                warn!("CacheUnavailable on purge: {}", e);
                0
            }
        }
    }
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
