//! Shared fixtures for checker integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use regscout_browser::{BrowserActions, SessionManager, SessionOptions};
use regscout_cache::{MemoryCacheStore, ResultCache, DEFAULT_TTL};
use regscout_checker::{
    Aggregator, AggregatorSettings, DisconnectPolicy, QueryLimits, RunnerSettings, TaskRunner,
};
use regscout_core::{DomainName, ProviderId};
use regscout_provider::{AdapterKind, ProviderAdapter, ProviderError, ProviderRegistry, ProviderResult};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a [`ScriptedAdapter`] does on every call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Available at `price` USD after `delay`
    Available { delay: Duration, price: Decimal },
    /// Registered after `delay`
    Taken { delay: Duration },
    /// Adapter error after `delay`
    Fail { delay: Duration },
    /// Never returns
    Hang,
}

pub struct ScriptedAdapter {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn available_after(delay: Duration, price: Decimal) -> Arc<Self> {
        Self::new(Script::Available { delay, price })
    }

    pub fn taken_after(delay: Duration) -> Arc<Self> {
        Self::new(Script::Taken { delay })
    }

    pub fn failing_after(delay: Duration) -> Arc<Self> {
        Self::new(Script::Fail { delay })
    }

    pub fn hanging() -> Arc<Self> {
        Self::new(Script::Hang)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Api
    }

    async fn check(&self, domain: &DomainName) -> regscout_provider::Result<ProviderResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Available { delay, price } => {
                tokio::time::sleep(*delay).await;
                Ok(ProviderResult::success(domain.as_str())
                    .with_available(true)
                    .with_registration_price(*price)
                    .with_currency("USD"))
            }
            Script::Taken { delay } => {
                tokio::time::sleep(*delay).await;
                Ok(ProviderResult::success(domain.as_str()).with_available(false))
            }
            Script::Fail { delay } => {
                tokio::time::sleep(*delay).await;
                Err(ProviderError::HttpStatus { status: 503 })
            }
            Script::Hang => std::future::pending().await,
        }
    }
}

/// Browser-kind adapter that holds a session for `hold` and reads the page.
pub struct SessionAdapter {
    sessions: SessionManager,
    hold: Duration,
}

impl SessionAdapter {
    pub fn new(sessions: SessionManager, hold: Duration) -> Arc<Self> {
        Arc::new(Self { sessions, hold })
    }
}

#[async_trait]
impl ProviderAdapter for SessionAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Browser
    }

    async fn check(&self, domain: &DomainName) -> regscout_provider::Result<ProviderResult> {
        let session = self
            .sessions
            .open(SessionOptions::ephemeral())
            .await
            .map_err(|e| ProviderError::Session(e.to_string()))?;

        let outcome = async {
            session.navigate(&format!("https://registrar.test/{domain}")).await?;
            tokio::time::sleep(self.hold).await;
            session.extract_text("body").await
        }
        .await;
        session.close().await;

        let text = outcome.map_err(|e| ProviderError::Session(e.to_string()))?;
        Ok(ProviderResult::success(domain.as_str())
            .with_available(text.contains("available"))
            .with_raw_text(text))
    }
}

pub type Entry = (ProviderId, Arc<dyn ProviderAdapter>);

pub fn entry(id: ProviderId, adapter: Arc<dyn ProviderAdapter>) -> Entry {
    (id, adapter)
}

pub fn domain() -> DomainName {
    DomainName::parse("example.tech").expect("valid domain")
}

pub fn settings(heartbeat: Duration, disconnect: DisconnectPolicy) -> AggregatorSettings {
    AggregatorSettings {
        limits: QueryLimits {
            default_timeout_ms: 5_000,
            max_timeout_ms: 120_000,
        },
        heartbeat_interval: heartbeat,
        disconnect,
    }
}

pub fn aggregator_with(
    adapters: Vec<Entry>,
    settings: AggregatorSettings,
) -> Aggregator {
    let mut registry = ProviderRegistry::new();
    for (id, adapter) in adapters {
        registry.register(id, adapter);
    }
    let cache = ResultCache::new(Arc::new(MemoryCacheStore::new()), DEFAULT_TTL);
    let runner = TaskRunner::new(
        cache,
        RunnerSettings {
            hard_ceiling: Duration::from_secs(230),
            backfill_late_results: true,
        },
    );
    Aggregator::new(Arc::new(registry), runner, settings)
}

pub fn aggregator(adapters: Vec<Entry>) -> Aggregator {
    aggregator_with(
        adapters,
        settings(Duration::from_secs(15), DisconnectPolicy::Detach),
    )
}
