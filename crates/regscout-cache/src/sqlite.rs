//! Durable cache store on the shared `SQLite` database.

use crate::error::Result;
use crate::store::CacheStore;
use async_trait::async_trait;
use chrono::Utc;
use regscout_db::{cache_entries, Database};
use std::time::Duration;

/// Cache store backed by the `cache_entries` table.
///
/// Expiry uses wall-clock time so entries survive restarts.
#[derive(Debug, Clone)]
pub struct SqliteCacheStore {
    db: Database,
}

impl SqliteCacheStore {
    /// Wrap a migrated database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = cache_entries::get_live(self.db.pool(), key, now_ms()).await?;
        Ok(row.map(|row| row.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let now = now_ms();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl_ms);
        cache_entries::upsert(self.db.pool(), key, &value, expires_at, now).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(cache_entries::delete(self.db.pool(), key).await?)
    }

    async fn purge_expired(&self) -> Result<u64> {
        Ok(cache_entries::purge_expired(self.db.pool(), now_ms()).await?)
    }
}
