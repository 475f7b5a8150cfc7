//! Long-lived services, built once at startup and torn down explicitly.

use anyhow::Context;
use regscout_adapters::{build_http_client, build_registry};
use regscout_browser::{ChromiumBackend, SessionBackend, SessionManager, SessionSettings};
use regscout_cache::{CacheStore, MemoryCacheStore, ResultCache, SqliteCacheStore};
use regscout_checker::{Aggregator, AggregatorSettings, RunnerSettings, TaskRunner};
use regscout_core::{AppConfig, StoreBackend};
use regscout_db::Database;
use regscout_queue::{JobQueue, JobStore, MemoryJobStore, QueueSettings, SqliteJobStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Shared state for every command.
#[derive(Debug)]
pub struct AppServices {
    pub config: AppConfig,
    /// Open only when a store uses `SQLite`
    pub db: Option<Database>,
    pub sessions: SessionManager,
    pub aggregator: Aggregator,
    pub queue: JobQueue,
}

impl AppServices {
    /// Build services that drive a local Chromium.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let backend = Arc::new(ChromiumBackend::new(config.browser.chrome_executable.clone()));
        Self::with_backend(config, backend).await
    }

    /// Build services on top of any session backend.
    pub async fn with_backend(
        config: AppConfig,
        backend: Arc<dyn SessionBackend>,
    ) -> anyhow::Result<Self> {
        let needs_db = config.cache.backend == StoreBackend::Sqlite
            || config.queue.backend == StoreBackend::Sqlite;
        let db = if needs_db {
            Some(open_database(&config).await?)
        } else {
            None
        };

        let cache_store: Arc<dyn CacheStore> = match (&db, config.cache.backend) {
            (Some(db), StoreBackend::Sqlite) => Arc::new(SqliteCacheStore::new(db.clone())),
            _ => Arc::new(MemoryCacheStore::new()),
        };
        let job_store: Arc<dyn JobStore> = match (&db, config.queue.backend) {
            (Some(db), StoreBackend::Sqlite) => Arc::new(SqliteJobStore::new(db.clone())),
            _ => Arc::new(MemoryJobStore::new()),
        };

        let profile_root = config
            .profile_root()
            .context("failed to resolve browser profile root")?;
        std::fs::create_dir_all(&profile_root).with_context(|| {
            format!("failed to create profile root {}", profile_root.display())
        })?;
        let sessions = SessionManager::new(
            backend,
            SessionSettings::from_config(&config.browser, profile_root),
        );

        let client = build_http_client(Duration::from_millis(config.checking.max_timeout_ms))?;
        let registry = build_registry(&config, &sessions, &client)?;

        let cache = ResultCache::new(cache_store, Duration::from_secs(config.cache.ttl_secs));
        let runner = TaskRunner::new(cache, RunnerSettings::from_config(&config));
        let aggregator = Aggregator::new(
            Arc::new(registry),
            runner,
            AggregatorSettings::from_config(&config.checking),
        );
        let queue = JobQueue::new(
            job_store,
            aggregator.clone(),
            QueueSettings::from_config(&config.queue),
        );

        info!(
            providers = aggregator.registry().len(),
            cache = ?config.cache.backend,
            queue = ?config.queue.backend,
            "services ready"
        );
        Ok(Self {
            config,
            db,
            sessions,
            aggregator,
            queue,
        })
    }

    /// Refuse new browser sessions and close the database.
    pub async fn shutdown(self) {
        self.sessions.shutdown();
        if let Some(db) = &self.db {
            db.close().await;
        }
        info!("services shut down");
    }
}

async fn open_database(config: &AppConfig) -> anyhow::Result<Database> {
    let path = config
        .database_path()
        .context("failed to resolve database path")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = Database::open(&path)
        .await
        .with_context(|| format!("failed to open database {}", path.display()))?;
    db.run_migrations()
        .await
        .context("failed to run database migrations")?;
    info!("Database: {}", path.display());
    Ok(db)
}
