//! Worker pool over a [`JobStore`].
//!
//! Workers claim due jobs and run them through [`Aggregator::check_one`].
//! An attempt fails when its result is `ok: false`; the job is then retried
//! after an exponential backoff until it runs out of attempts. Retries skip
//! the cache read, otherwise they would only replay the cached failure.

use crate::error::{QueueError, Result};
use crate::job::{Job, JobCounts, JobId, JobPayload};
use crate::store::JobStore;
use chrono::{DateTime, Utc};
use regscout_checker::{Aggregator, CacheMode, CheckError, CheckRequest, DomainQuery};
use regscout_core::QueueConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Queue tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// Concurrent workers
    pub worker_concurrency: usize,
    /// Attempts per job
    pub max_attempts: u32,
    /// Delay before the first retry
    pub backoff_base: Duration,
    /// How long finished jobs are kept
    pub retention: Duration,
    /// Interval of the pruning task
    pub prune_interval: Duration,
    /// Idle workers re-check the store at this interval
    pub poll_interval: Duration,
}

impl QueueSettings {
    /// Settings from the queue section of the configuration.
    #[must_use]
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            worker_concurrency: config.worker_concurrency.max(1),
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            retention: Duration::from_secs(config.retention_secs),
            prune_interval: Duration::from_secs(config.prune_interval_secs.max(1)),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        }
    }

    /// Delay before the attempt following attempt number `attempt`:
    /// `backoff_base * 2^(attempt - 1)`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.backoff_base.saturating_mul(1 << exponent)
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

/// Background queue of single-provider checks.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    aggregator: Aggregator,
    settings: QueueSettings,
    default_timeout_ms: u64,
    wakeup: Arc<Notify>,
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("settings", &self.settings)
            .field("default_timeout_ms", &self.default_timeout_ms)
            .finish_non_exhaustive()
    }
}

impl JobQueue {
    /// Create a queue. Nothing runs until [`JobQueue::start`].
    #[must_use]
    pub fn new(store: Arc<dyn JobStore>, aggregator: Aggregator, settings: QueueSettings) -> Self {
        let default_timeout_ms = aggregator.settings().limits.default_timeout_ms;
        Self {
            store,
            aggregator,
            settings,
            default_timeout_ms,
            wakeup: Arc::new(Notify::new()),
        }
    }

    #[must_use]
    pub fn settings(&self) -> QueueSettings {
        self.settings
    }

    /// Queue one provider check.
    pub async fn enqueue(&self, payload: JobPayload) -> Result<JobId> {
        if !self.aggregator.registry().contains(payload.provider) {
            return Err(CheckError::InvalidQuery(format!(
                "provider '{}' is not enabled",
                payload.provider
            ))
            .into());
        }

        let job = Job::new(payload, self.settings.max_attempts, Utc::now());
        self.store.insert(&job).await?;
        debug!(job = %job.id, provider = %job.payload.provider, domain = %job.payload.domain, "job enqueued");
        self.wakeup.notify_waiters();
        Ok(job.id)
    }

    /// Queue one job per provider of a validated query.
    pub async fn enqueue_query(&self, query: &DomainQuery) -> Result<Vec<JobId>> {
        let mut ids = Vec::with_capacity(query.providers.len());
        for &provider in &query.providers {
            let payload = JobPayload::new(provider, query.domain.clone(), query.timeout_ms);
            ids.push(self.enqueue(payload).await?);
        }
        Ok(ids)
    }

    /// Validate a request and queue its providers.
    pub async fn enqueue_request(&self, request: &CheckRequest) -> Result<Vec<JobId>> {
        let query = self.aggregator.resolve(request)?;
        self.enqueue_query(&query).await
    }

    pub async fn get(&self, id: JobId) -> Result<Job> {
        self.store.get(id).await?.ok_or(QueueError::NotFound(id))
    }

    pub async fn counts(&self) -> Result<JobCounts> {
        self.store.counts().await
    }

    /// Claim and run one due job. Returns whether there was one.
    pub async fn process_next(&self) -> Result<bool> {
        let Some(job) = self.store.claim_next(Utc::now()).await? else {
            return Ok(false);
        };
        self.run_attempt(job).await?;
        Ok(true)
    }

    async fn run_attempt(&self, job: Job) -> Result<()> {
        let JobPayload {
            provider,
            ref domain,
            timeout_ms,
        } = job.payload;
        let mode = if job.attempts > 1 {
            CacheMode::Refresh
        } else {
            CacheMode::ReadWrite
        };
        let timeout_ms = if timeout_ms == 0 {
            self.default_timeout_ms
        } else {
            timeout_ms
        };

        debug!(job = %job.id, attempt = job.attempts, provider = %provider, domain = %domain, "running job");
        let outcome = match self
            .aggregator
            .check_one(provider, domain, timeout_ms, mode)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                // cannot succeed on a later attempt either
                warn!(job = %job.id, "job can never run: {}", e);
                self.store
                    .fail(job.id, &e.to_string(), None, Utc::now())
                    .await?;
                return Ok(());
            }
        };

        let now = Utc::now();
        let result = outcome.result;
        if result.ok {
            self.store.complete(job.id, &result, now).await?;
            info!(job = %job.id, provider = %provider, domain = %domain, "job completed");
            return Ok(());
        }

        let error = result
            .error
            .clone()
            .unwrap_or_else(|| "provider reported failure".to_string());
        if job.has_attempts_left() {
            let delay = self.settings.backoff(job.attempts);
            let run_at = later(now, delay);
            self.store.retry(job.id, &error, run_at, now).await?;
            info!(
                job = %job.id,
                attempt = job.attempts,
                retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "attempt failed, retrying: {}",
                error
            );
        } else {
            self.store.fail(job.id, &error, Some(&result), now).await?;
            warn!(job = %job.id, attempts = job.attempts, "job failed: {}", error);
        }
        Ok(())
    }

    /// Delete finished jobs older than the retention window.
    pub async fn prune(&self) -> Result<u64> {
        let before = earlier(Utc::now(), self.settings.retention);
        let pruned = self.store.prune_finished(before).await?;
        if pruned > 0 {
            debug!(pruned, "pruned finished jobs");
        }
        Ok(pruned)
    }

    /// Recover interrupted jobs and start the workers and the pruner.
    pub async fn start(&self) -> Result<QueueHandle> {
        let requeued = self.store.requeue_active(Utc::now()).await?;
        if requeued > 0 {
            info!(requeued, "returned interrupted jobs to the queue");
        }

        let token = CancellationToken::new();
        let mut tasks = Vec::with_capacity(self.settings.worker_concurrency + 1);
        for worker in 0..self.settings.worker_concurrency {
            let queue = self.clone();
            let token = token.clone();
            tasks.push(tokio::spawn(async move { queue.worker_loop(worker, token).await }));
        }
        let queue = self.clone();
        let pruner_token = token.clone();
        tasks.push(tokio::spawn(async move { queue.prune_loop(pruner_token).await }));

        info!(
            workers = self.settings.worker_concurrency,
            "job queue started"
        );
        Ok(QueueHandle {
            token,
            tasks,
            queue: self.clone(),
        })
    }

    async fn worker_loop(self, worker: usize, token: CancellationToken) {
        debug!(worker, "queue worker started");
        while !token.is_cancelled() {
            match self.process_next().await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => error!(worker, "queue worker error: {}", e),
            }

            tokio::select! {
                () = token.cancelled() => break,
                () = self.wakeup.notified() => {}
                () = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
        debug!(worker, "queue worker stopped");
    }

    async fn prune_loop(self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.settings.prune_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.prune().await {
                        warn!("job pruning failed: {}", e);
                    }
                }
            }
        }
    }
}

fn later(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn earlier(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delay| now.checked_sub_signed(delay))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Running workers of a [`JobQueue`].
#[derive(Debug)]
pub struct QueueHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    queue: JobQueue,
}

impl QueueHandle {
    /// Wait until no job is waiting or active, checking every poll interval.
    pub async fn drained(&self) -> Result<JobCounts> {
        loop {
            let counts = self.queue.counts().await?;
            if counts.pending() == 0 {
                return Ok(counts);
            }
            tokio::time::sleep(self.queue.settings.poll_interval).await;
        }
    }

    /// Stop the workers. A job that is mid-attempt finishes first.
    pub async fn shutdown(self) {
        self.token.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("queue task ended abnormally: {}", e);
            }
        }
        info!("job queue stopped");
    }
}

