use crate::error::Result;
use crate::job::{Job, JobCounts, JobId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regscout_provider::ProviderResult;

/// Persistence for queued jobs.
///
/// Every transition out of `Active` only applies to a job that is still
/// active and reports whether it did, so a job can finish at most once.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Store a new job.
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Claim the earliest due waiting job: mark it active and count the
    /// attempt.
    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Job>>;

    /// Active job finished with `result`.
    async fn complete(&self, id: JobId, result: &ProviderResult, now: DateTime<Utc>)
        -> Result<bool>;

    /// Active job goes back to waiting until `run_at`.
    async fn retry(
        &self,
        id: JobId,
        error: &str,
        run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Active job is out of attempts.
    async fn fail(
        &self,
        id: JobId,
        error: &str,
        result: Option<&ProviderResult>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    async fn get(&self, id: JobId) -> Result<Option<Job>>;

    async fn counts(&self) -> Result<JobCounts>;

    /// Delete finished jobs that finished before `before`.
    async fn prune_finished(&self, before: DateTime<Utc>) -> Result<u64>;

    /// Return active jobs to waiting, due `now`.
    async fn requeue_active(&self, now: DateTime<Utc>) -> Result<u64>;
}
