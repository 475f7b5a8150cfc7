//! Key-value store abstraction behind the result cache.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A string key-value store with per-entry expiry.
///
/// Implementations must make a `set` visible atomically: a concurrent `get`
/// sees either the previous value or the new one, never a partial write.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a live value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value, expiring
    /// `ttl` from now.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Remove `key`. Returns whether a live or expired entry existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Drop expired entries, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64>;
}
