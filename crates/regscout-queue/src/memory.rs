//! Process-local job store.

use crate::error::Result;
use crate::job::{Job, JobCounts, JobId, JobState};
use crate::store::JobStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regscout_provider::ProviderResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Jobs kept in a map; lost on exit.
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<Mutex<HashMap<JobId, Job>>>,
}

impl MemoryJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `update` to the job if it is still active.
    async fn finish_active<F>(&self, id: JobId, update: F) -> bool
    where
        F: FnOnce(&mut Job) + Send,
    {
        let mut jobs = self.jobs.lock().await;
        match jobs.get_mut(&id) {
            Some(job) if job.state == JobState::Active => {
                update(job);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        self.jobs.lock().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Job>> {
        let mut jobs = self.jobs.lock().await;
        let next = jobs
            .values()
            .filter(|job| job.state == JobState::Waiting && job.run_at <= now)
            .min_by_key(|job| (job.run_at, job.created_at))
            .map(|job| job.id);

        Ok(next.and_then(|id| jobs.get_mut(&id)).map(|job| {
            job.state = JobState::Active;
            job.attempts += 1;
            job.updated_at = now;
            job.clone()
        }))
    }

    async fn complete(
        &self,
        id: JobId,
        result: &ProviderResult,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self
            .finish_active(id, |job| {
                job.state = JobState::Completed;
                job.result = Some(result.clone());
                job.updated_at = now;
                job.finished_at = Some(now);
            })
            .await)
    }

    async fn retry(
        &self,
        id: JobId,
        error: &str,
        run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self
            .finish_active(id, |job| {
                job.state = JobState::Waiting;
                job.last_error = Some(error.to_string());
                job.run_at = run_at;
                job.updated_at = now;
            })
            .await)
    }

    async fn fail(
        &self,
        id: JobId,
        error: &str,
        result: Option<&ProviderResult>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self
            .finish_active(id, |job| {
                job.state = JobState::Failed;
                job.last_error = Some(error.to_string());
                job.result = result.cloned();
                job.updated_at = now;
                job.finished_at = Some(now);
            })
            .await)
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        Ok(self.jobs.lock().await.get(&id).cloned())
    }

    async fn counts(&self) -> Result<JobCounts> {
        let mut counts = JobCounts::default();
        for job in self.jobs.lock().await.values() {
            counts.add(job.state, 1);
        }
        Ok(counts)
    }

    async fn prune_finished(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut jobs = self.jobs.lock().await;
        let len = jobs.len();
        jobs.retain(|_, job| !matches!(job.finished_at, Some(at) if at < before));
        Ok(u64::try_from(len - jobs.len()).unwrap_or(u64::MAX))
    }

    async fn requeue_active(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut requeued = 0;
        for job in self.jobs.lock().await.values_mut() {
            if job.state == JobState::Active {
                job.state = JobState::Waiting;
                job.run_at = now;
                job.updated_at = now;
                requeued += 1;
            }
        }
        Ok(requeued)
    }
}
