//! Row access for the `cache_entries` table.
//!
//! Values are opaque serialized strings; expiry is enforced on read so an
//! expired row is indistinguishable from a missing one.

use sqlx::SqlitePool;

/// A stored cache row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CacheEntryRow {
    /// Cache key (`<provider>:<domain>`)
    pub key: String,
    /// Serialized value
    pub value: String,
    /// Expiry, unix epoch milliseconds
    pub expires_at: i64,
    /// Write time, unix epoch milliseconds
    pub written_at: i64,
}

/// Fetch a row that has not expired at `now_ms`.
pub async fn get_live(
    pool: &SqlitePool,
    key: &str,
    now_ms: i64,
) -> Result<Option<CacheEntryRow>, sqlx::Error> {
    sqlx::query_as::<_, CacheEntryRow>(
        "SELECT key, value, expires_at, written_at FROM cache_entries
         WHERE key = ? AND expires_at > ?",
    )
    .bind(key)
    .bind(now_ms)
    .fetch_optional(pool)
    .await
}

/// Insert or wholly replace the row for `key`.
pub async fn upsert(
    pool: &SqlitePool,
    key: &str,
    value: &str,
    expires_at_ms: i64,
    now_ms: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO cache_entries (key, value, expires_at, written_at) VALUES (?, ?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET
             value = excluded.value,
             expires_at = excluded.expires_at,
             written_at = excluded.written_at",
    )
    .bind(key)
    .bind(value)
    .bind(expires_at_ms)
    .bind(now_ms)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete the row for `key`. Returns whether a row existed.
pub async fn delete(pool: &SqlitePool, key: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cache_entries WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove every row that expired at or before `now_ms`.
pub async fn purge_expired(pool: &SqlitePool, now_ms: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
        .bind(now_ms)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_test_db() -> Database {
        let db = Database::in_memory().await.expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = setup_test_db().await;

        upsert(db.pool(), "porkbun:example.tech", "{\"ok\":true}", 2_000, 1_000)
            .await
            .expect("insert entry");

        let row = get_live(db.pool(), "porkbun:example.tech", 1_500)
            .await
            .expect("query entry")
            .expect("entry present");
        assert_eq!(row.value, "{\"ok\":true}");
        assert_eq!(row.written_at, 1_000);
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent() {
        let db = setup_test_db().await;

        upsert(db.pool(), "gandi:example.tech", "v", 2_000, 1_000)
            .await
            .expect("insert entry");

        let row = get_live(db.pool(), "gandi:example.tech", 2_000)
            .await
            .expect("query entry");
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_whole_row() {
        let db = setup_test_db().await;

        upsert(db.pool(), "k", "first", 2_000, 1_000).await.expect("insert");
        upsert(db.pool(), "k", "second", 9_000, 1_200).await.expect("replace");

        let row = get_live(db.pool(), "k", 5_000)
            .await
            .expect("query entry")
            .expect("entry present");
        assert_eq!(row.value, "second");
        assert_eq!(row.expires_at, 9_000);
        assert_eq!(row.written_at, 1_200);
    }

    #[tokio::test]
    async fn test_delete_and_purge() {
        let db = setup_test_db().await;

        upsert(db.pool(), "a", "1", 1_000, 0).await.expect("insert a");
        upsert(db.pool(), "b", "2", 5_000, 0).await.expect("insert b");
        upsert(db.pool(), "c", "3", 5_000, 0).await.expect("insert c");

        assert!(delete(db.pool(), "c").await.expect("delete c"));
        assert!(!delete(db.pool(), "c").await.expect("delete c again"));

        let purged = purge_expired(db.pool(), 2_000).await.expect("purge");
        assert_eq!(purged, 1);
        assert!(get_live(db.pool(), "b", 2_000)
            .await
            .expect("query b")
            .is_some());
    }
}
