//! Fan-out of one query over its providers.
//!
//! Streaming is the primitive: [`Aggregator::stream`] spawns one task runner
//! per provider and forwards results in completion order. Collect-all
//! ([`Aggregator::collect`]) drains that same stream.

use crate::error::{CheckError, Result};
use crate::event::{DoneSummary, QueryEvent, QueryReport};
use crate::query::{CheckRequest, DomainQuery, QueryLimits};
use crate::runner::{CacheMode, OutcomeSource, TaskOutcome, TaskRunner};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::stream::{FuturesUnordered, StreamExt};
use regscout_core::{CheckingConfig, DomainName, ProviderId};
use regscout_provider::{ProviderRegistry, ProviderResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Events of one query, ending after `done`.
pub type QueryStream = UnboundedReceiver<QueryEvent>;

/// What happens to outstanding checks when a stream consumer goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectPolicy {
    /// Keep running; results still land in the cache.
    #[default]
    Detach,
    /// Abort the remaining task runners.
    Cancel,
}

/// Aggregator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorSettings {
    /// Timeout policy for incoming requests
    pub limits: QueryLimits,
    /// Idle interval between heartbeats
    pub heartbeat_interval: Duration,
    /// Behavior after the consumer drops a stream
    pub disconnect: DisconnectPolicy,
}

impl AggregatorSettings {
    /// Settings from the checking section of the configuration.
    #[must_use]
    pub fn from_config(config: &CheckingConfig) -> Self {
        Self {
            limits: QueryLimits::from_config(config),
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs.max(1)),
            disconnect: if config.cancel_on_disconnect {
                DisconnectPolicy::Cancel
            } else {
                DisconnectPolicy::Detach
            },
        }
    }
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self::from_config(&CheckingConfig::default())
    }
}

/// Runs queries against the registered providers.
#[derive(Debug, Clone)]
pub struct Aggregator {
    registry: Arc<ProviderRegistry>,
    runner: TaskRunner,
    settings: AggregatorSettings,
}

impl Aggregator {
    /// Create an aggregator over `registry`.
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        runner: TaskRunner,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            registry,
            runner,
            settings,
        }
    }

    /// Registered providers.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// The shared task runner.
    #[must_use]
    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> AggregatorSettings {
        self.settings
    }

    /// Validate a request. Nothing is scheduled.
    pub fn resolve(&self, request: &CheckRequest) -> Result<DomainQuery> {
        DomainQuery::resolve(request, &self.registry, self.settings.limits)
    }

    /// Start `query` and return its event stream.
    ///
    /// The fan-out runs on its own task. Dropping the stream before `done`
    /// applies the configured [`DisconnectPolicy`].
    pub fn stream(&self, query: DomainQuery) -> QueryStream {
        let (tx, rx) = mpsc::unbounded();
        let aggregator = self.clone();
        tokio::spawn(async move { aggregator.drive(query, tx).await });
        rx
    }

    /// Run `query` to completion and return one result per provider.
    pub async fn collect(&self, query: DomainQuery) -> QueryReport {
        let domain = query.domain.to_string();
        let mut results = BTreeMap::new();
        let mut ok = false;

        let mut events = self.stream(query);
        while let Some(event) = events.next().await {
            match event {
                QueryEvent::Result(outcome) => {
                    results.insert(outcome.provider, outcome.result);
                }
                QueryEvent::Done(summary) => ok = summary.ok,
                QueryEvent::Init(_) | QueryEvent::Heartbeat => {}
            }
        }

        QueryReport {
            ok,
            domain,
            results,
        }
    }

    /// Validate and run a request, collecting every result.
    pub async fn check(&self, request: &CheckRequest) -> Result<QueryReport> {
        let query = self.resolve(request)?;
        Ok(self.collect(query).await)
    }

    /// Check a single provider. Used by the job queue.
    pub async fn check_one(
        &self,
        provider: ProviderId,
        domain: &DomainName,
        timeout_ms: u64,
        mode: CacheMode,
    ) -> Result<TaskOutcome> {
        let adapter = self
            .registry
            .get(provider)
            .map_err(|e| CheckError::InvalidQuery(e.to_string()))?;
        if timeout_ms == 0 {
            return Err(CheckError::InvalidQuery(
                "timeoutMs must be greater than zero".to_string(),
            ));
        }
        let timeout_ms = timeout_ms.min(self.settings.limits.max_timeout_ms);

        Ok(self
            .runner
            .run(provider, domain, adapter, timeout_ms, mode)
            .await)
    }

    async fn drive(self, query: DomainQuery, tx: UnboundedSender<QueryEvent>) {
        let started = Instant::now();
        info!(
            domain = %query.domain,
            providers = query.providers.len(),
            timeout_ms = query.timeout_ms,
            "starting query"
        );

        let mut connected = emit(&tx, QueryEvent::Init(query.clone()));
        let mut aborts: Vec<AbortHandle> = Vec::with_capacity(query.providers.len());
        let mut pending = FuturesUnordered::new();

        for &provider in &query.providers {
            let domain = query.domain.clone();
            let handle = match self.registry.get(provider) {
                Ok(adapter) => {
                    let runner = self.runner.clone();
                    let timeout_ms = query.timeout_ms;
                    tokio::spawn(async move {
                        runner
                            .run(provider, &domain, adapter, timeout_ms, CacheMode::ReadWrite)
                            .await
                    })
                }
                Err(e) => {
                    warn!(provider = %provider, "no adapter for provider: {}", e);
                    let outcome = TaskOutcome {
                        provider,
                        result: ProviderResult::failure(domain.as_str(), e.to_string()),
                        source: OutcomeSource::Adapter,
                        elapsed: Duration::ZERO,
                    };
                    tokio::spawn(async move { outcome })
                }
            };
            aborts.push(handle.abort_handle());
            pending.push(async move { (provider, handle.await) });
        }

        let period = self.settings.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut summary = DoneSummary::default();

        loop {
            tokio::select! {
                next = pending.next() => {
                    let Some((provider, joined)) = next else { break };
                    let outcome = joined.unwrap_or_else(|e| {
                        warn!(provider = %provider, "check task failed: {}", e);
                        TaskOutcome {
                            provider,
                            result: ProviderResult::failure(
                                query.domain.as_str(),
                                "provider check crashed",
                            ),
                            source: OutcomeSource::Adapter,
                            elapsed: started.elapsed(),
                        }
                    });
                    summary.record(&outcome.result);
                    heartbeat.reset();
                    if connected {
                        connected = emit(&tx, QueryEvent::Result(outcome));
                    }
                }
                _ = heartbeat.tick(), if connected => {
                    connected = emit(&tx, QueryEvent::Heartbeat);
                }
            }

            if connected && tx.is_closed() {
                connected = false;
            }
            if !connected && self.settings.disconnect == DisconnectPolicy::Cancel {
                debug!(domain = %query.domain, remaining = pending.len(), "consumer gone, cancelling");
                for abort in &aborts {
                    abort.abort();
                }
                return;
            }
        }

        info!(
            domain = %query.domain,
            succeeded = summary.succeeded,
            failed = summary.failed,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "query finished"
        );
        if connected {
            emit(&tx, QueryEvent::Done(summary));
        } else {
            debug!(domain = %query.domain, "consumer gone, results kept in cache only");
        }
    }
}

/// Send one event; `false` once the consumer is gone.
fn emit(tx: &UnboundedSender<QueryEvent>, event: QueryEvent) -> bool {
    match tx.unbounded_send(event) {
        Ok(()) => true,
        Err(_) => {
            debug!("query stream consumer disconnected");
            false
        }
    }
}
