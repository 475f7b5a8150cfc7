//! Task runner: one provider lookup with cache, deadline and cache write.
//!
//! Two timers are involved and they are never conflated. The logical
//! timeout only decides what `run` returns; the adapter invocation keeps
//! running on its own task. The hard ceiling bounds that task's lifetime so
//! an adapter that never returns cannot live forever; browser resources are
//! reclaimed separately by the session watchdog.

use regscout_cache::{CacheKey, ResultCache};
use regscout_core::{AppConfig, DomainName, ProviderId};
use regscout_provider::{ProviderAdapter, ProviderResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Added to the session watchdog ceiling to get the invocation ceiling, so
/// a watchdog reclaim gets to finish before the task is dropped.
pub const HARD_CEILING_GRACE: Duration = Duration::from_secs(30);

/// Whether a run may answer from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Read before invoking, write after.
    #[default]
    ReadWrite,
    /// Skip the read, still write. Used for retries.
    Refresh,
}

/// Where a run's result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeSource {
    Cache,
    Adapter,
    Timeout,
}

/// A settled run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub provider: ProviderId,
    pub result: ProviderResult,
    pub source: OutcomeSource,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Outer bound on one adapter invocation
    pub hard_ceiling: Duration,
    /// Overwrite a cached timeout with the late result
    pub backfill_late_results: bool,
}

impl RunnerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            hard_ceiling: Duration::from_secs(config.browser.session_hard_timeout_secs)
                + HARD_CEILING_GRACE,
            backfill_late_results: config.checking.backfill_late_results,
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct TaskRunner {
    cache: ResultCache,
    settings: RunnerSettings,
}

impl TaskRunner {
    pub fn new(cache: ResultCache, settings: RunnerSettings) -> Self {
        Self { cache, settings }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Run one lookup. Never fails: every failure is an `ok: false` result.
    ///
    /// Returns within `timeout_ms` plus the cost of the cache write.
    pub async fn run(
        &self,
        provider: ProviderId,
        domain: &DomainName,
        adapter: Arc<dyn ProviderAdapter>,
        timeout_ms: u64,
        mode: CacheMode,
    ) -> TaskOutcome {
        let started = Instant::now();
        let deadline = started + Duration::from_millis(timeout_ms);
        let key = CacheKey::new(provider, domain.clone());

        let outcome = |result: ProviderResult, source: OutcomeSource| TaskOutcome {
            provider,
            result,
            source,
            elapsed: started.elapsed(),
        };

        if mode == CacheMode::ReadWrite {
            match tokio::time::timeout_at(deadline, self.cache.get(&key)).await {
                Ok(Some(cached)) => return outcome(cached, OutcomeSource::Cache),
                Ok(None) => {}
                Err(_) => warn!(key = %key, "cache read outlived the task deadline"),
            }
        }

        debug!(provider = %provider, kind = %adapter.kind(), domain = %domain, "invoking adapter");
        let mut invocation = self.spawn_invocation(domain.clone(), adapter);

        match tokio::time::timeout_at(deadline, &mut invocation).await {
            Ok(joined) => {
                let result = joined.unwrap_or_else(|e| {
                    warn!(provider = %provider, "adapter task failed: {}", e);
                    ProviderResult::failure(domain.as_str(), "provider adapter crashed")
                });
                self.cache.put(&key, &result).await;
                outcome(result, OutcomeSource::Adapter)
            }
            Err(_) => {
                warn!(provider = %provider, domain = %domain, timeout_ms, "provider timed out");
                let result = ProviderResult::timed_out(domain.as_str(), timeout_ms);
                self.cache.put(&key, &result).await;
                if self.settings.backfill_late_results {
                    self.spawn_backfill(key, result.clone(), invocation);
                }
                // otherwise dropping the handle detaches the invocation
                outcome(result, OutcomeSource::Timeout)
            }
        }
    }

    fn spawn_invocation(
        &self,
        domain: DomainName,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> JoinHandle<ProviderResult> {
        let hard_ceiling = self.settings.hard_ceiling;
        tokio::spawn(async move {
            match tokio::time::timeout(hard_ceiling, adapter.check(&domain)).await {
                Ok(Ok(result)) => result.conform(&domain),
                Ok(Err(e)) => ProviderResult::failure(domain.as_str(), e.to_string()),
                Err(_) => {
                    warn!(domain = %domain, "adapter abandoned at hard ceiling");
                    ProviderResult::failure(
                        domain.as_str(),
                        format!("Abandoned after {} s", hard_ceiling.as_secs()),
                    )
                }
            }
        })
    }

    /// Write the late result over the cached timeout once it arrives.
    ///
    /// The entry is left alone if anything replaced the timeout meanwhile.
    fn spawn_backfill(
        &self,
        key: CacheKey,
        timed_out: ProviderResult,
        invocation: JoinHandle<ProviderResult>,
    ) {
        let cache = self.cache.clone();
        tokio::spawn(async move {
            match invocation.await {
                Ok(result) => {
                    if cache.get(&key).await.as_ref() != Some(&timed_out) {
                        debug!(key = %key, "late result superseded, not backfilled");
                        return;
                    }
                    if cache.put(&key, &result).await {
                        debug!(key = %key, ok = result.ok, "backfilled late result");
                    }
                }
                Err(e) => debug!(key = %key, "late invocation ended without result: {}", e),
            }
        });
    }
}
