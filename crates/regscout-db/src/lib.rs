//! regscout Database Layer
//!
//! Provides `SQLite` storage for the result cache and the background job
//! queue. Uses `SQLx` with embedded migrations; both tables live in one
//! database so a single migrator owns the schema.
//!
//! # Example
//!
//! ```ignore
//! use regscout_db::Database;
//!
//! let db = Database::open("regscout.db").await?;
//! db.run_migrations().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cache_entries;
pub mod connection;
pub mod error;
pub mod migrations;
pub mod queue_jobs;

// Re-export commonly used types
pub use cache_entries::CacheEntryRow;
pub use connection::{ConnectionPool, IN_MEMORY};
pub use error::{DatabaseError, Result};
pub use queue_jobs::JobRow;

use std::path::Path;

/// High-level database handle.
///
/// Cheap to clone; clones share the underlying pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Open (creating if missing) the database at `path`.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let pool = ConnectionPool::open(path).await?;
        Ok(Self { pool })
    }

    /// Open a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Self::open(IN_MEMORY).await
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(self.pool.pool()).await
    }

    /// Get the current schema version.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(self.pool.pool()).await
    }

    /// Get a reference to the underlying `SQLx` pool.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        self.pool.pool()
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
