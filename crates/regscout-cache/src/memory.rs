//! In-process cache store.

use crate::error::Result;
use crate::store::CacheStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// `HashMap` store guarded by a `RwLock`. Expired entries are ignored on
/// read and removed by `purge_expired`.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no entries at all.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let store = MemoryCacheStore::new();
        store
            .set("porkbun:example.tech", "v".to_string(), Duration::from_secs(60))
            .await
            .expect("set");

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(
            store.get("porkbun:example.tech").await.expect("get"),
            Some("v".to_string())
        );

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("porkbun:example.tech").await.expect("get"), None);

        assert_eq!(store.purge_expired().await.expect("purge"), 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_replaces_and_delete() {
        let store = MemoryCacheStore::new();
        let ttl = Duration::from_secs(60);
        store.set("k", "one".to_string(), ttl).await.expect("set");
        store.set("k", "two".to_string(), ttl).await.expect("replace");

        assert_eq!(store.get("k").await.expect("get"), Some("two".to_string()));
        assert_eq!(store.len().await, 1);

        assert!(store.delete("k").await.expect("delete"));
        assert!(!store.delete("k").await.expect("delete again"));
    }
}
