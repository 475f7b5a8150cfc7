//! Durable job store on the shared `SQLite` database.

use crate::error::{QueueError, Result};
use crate::job::{Job, JobCounts, JobId, JobPayload, JobState};
use crate::store::JobStore;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use regscout_db::queue_jobs::{self, JobRow};
use regscout_db::Database;
use regscout_provider::ProviderResult;

/// Job store backed by the `queue_jobs` table.
#[derive(Debug, Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    /// Wrap a migrated database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn to_row(job: &Job) -> Result<JobRow> {
    Ok(JobRow {
        id: job.id.to_string(),
        provider: job.payload.provider.as_str().to_string(),
        domain: job.payload.domain.to_string(),
        timeout_ms: i64::try_from(job.payload.timeout_ms).unwrap_or(i64::MAX),
        state: job.state.as_str().to_string(),
        attempts: i64::from(job.attempts),
        max_attempts: i64::from(job.max_attempts),
        run_at: job.run_at.timestamp_millis(),
        last_error: job.last_error.clone(),
        result: job.result.as_ref().map(serde_json::to_string).transpose()?,
        created_at: job.created_at.timestamp_millis(),
        updated_at: job.updated_at.timestamp_millis(),
        finished_at: job.finished_at.map(|at| at.timestamp_millis()),
    })
}

fn from_row(row: JobRow) -> Result<Job> {
    let corrupt = |reason: String| QueueError::Corrupt {
        id: row.id.clone(),
        reason,
    };
    let time = |ms: i64| {
        Utc.timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| corrupt(format!("timestamp out of range: {ms}")))
    };

    let payload = JobPayload {
        provider: row.provider.parse().map_err(|e| corrupt(format!("{e}")))?,
        domain: row.domain.parse().map_err(|e| corrupt(format!("{e}")))?,
        timeout_ms: u64::try_from(row.timeout_ms).map_err(|e| corrupt(e.to_string()))?,
    };

    Ok(Job {
        id: row.id.parse().map_err(|e| corrupt(format!("{e}")))?,
        payload,
        state: row.state.parse::<JobState>().map_err(&corrupt)?,
        attempts: u32::try_from(row.attempts).map_err(|e| corrupt(e.to_string()))?,
        max_attempts: u32::try_from(row.max_attempts).map_err(|e| corrupt(e.to_string()))?,
        run_at: time(row.run_at)?,
        last_error: row.last_error.clone(),
        result: row
            .result
            .as_deref()
            .map(serde_json::from_str::<ProviderResult>)
            .transpose()?,
        created_at: time(row.created_at)?,
        updated_at: time(row.updated_at)?,
        finished_at: row.finished_at.map(time).transpose()?,
    })
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        queue_jobs::insert_job(self.db.pool(), &to_row(job)?).await?;
        Ok(())
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Job>> {
        queue_jobs::claim_next(self.db.pool(), now.timestamp_millis())
            .await?
            .map(from_row)
            .transpose()
    }

    async fn complete(
        &self,
        id: JobId,
        result: &ProviderResult,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = serde_json::to_string(result)?;
        Ok(queue_jobs::mark_completed(
            self.db.pool(),
            &id.to_string(),
            &result,
            now.timestamp_millis(),
        )
        .await?)
    }

    async fn retry(
        &self,
        id: JobId,
        error: &str,
        run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(queue_jobs::schedule_retry(
            self.db.pool(),
            &id.to_string(),
            error,
            run_at.timestamp_millis(),
            now.timestamp_millis(),
        )
        .await?)
    }

    async fn fail(
        &self,
        id: JobId,
        error: &str,
        result: Option<&ProviderResult>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = result.map(serde_json::to_string).transpose()?;
        Ok(queue_jobs::mark_failed(
            self.db.pool(),
            &id.to_string(),
            error,
            result.as_deref(),
            now.timestamp_millis(),
        )
        .await?)
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        queue_jobs::get_job(self.db.pool(), &id.to_string())
            .await?
            .map(from_row)
            .transpose()
    }

    async fn counts(&self) -> Result<JobCounts> {
        let mut counts = JobCounts::default();
        for (state, n) in queue_jobs::count_by_state(self.db.pool()).await? {
            match state.parse::<JobState>() {
                Ok(state) => counts.add(state, u64::try_from(n).unwrap_or(0)),
                Err(e) => tracing::warn!("Skipping jobs with {}", e),
            }
        }
        Ok(counts)
    }

    async fn prune_finished(&self, before: DateTime<Utc>) -> Result<u64> {
        Ok(queue_jobs::prune_finished(self.db.pool(), before.timestamp_millis()).await?)
    }

    async fn requeue_active(&self, now: DateTime<Utc>) -> Result<u64> {
        Ok(queue_jobs::requeue_active(self.db.pool(), now.timestamp_millis()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use regscout_core::{DomainName, ProviderId};

    async fn store() -> SqliteJobStore {
        let db = Database::in_memory().await.expect("create database");
        db.run_migrations().await.expect("run migrations");
        SqliteJobStore::new(db)
    }

    fn job(now: DateTime<Utc>) -> Job {
        let payload = JobPayload::new(
            ProviderId::Namecheap,
            DomainName::parse("example.tech").expect("valid domain"),
            30_000,
        );
        Job::new(payload, 2, now)
    }

    // sub-millisecond precision does not survive storage
    fn stored_now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(Utc::now().timestamp_millis())
            .single()
            .expect("valid timestamp")
    }

    #[tokio::test]
    async fn test_job_survives_storage() {
        let store = store().await;
        let now = stored_now();
        let job = job(now);
        store.insert(&job).await.expect("insert");

        assert_eq!(store.get(job.id).await.expect("get"), Some(job.clone()));
        assert_eq!(store.get(JobId::new()).await.expect("get"), None);
    }

    #[tokio::test]
    async fn test_retry_then_fail_keeps_result() {
        let store = store().await;
        let now = stored_now();
        let job = job(now);
        store.insert(&job).await.expect("insert");

        store.claim_next(now).await.expect("claim").expect("due job");
        let later = now + Duration::seconds(5);
        assert!(store
            .retry(job.id, "blocked by provider: captcha", later, now)
            .await
            .expect("retry"));
        assert!(store.claim_next(now).await.expect("claim").is_none());

        let second = store
            .claim_next(later)
            .await
            .expect("claim")
            .expect("due job");
        assert_eq!(second.attempts, 2);

        let result = ProviderResult::failure("example.tech", "blocked by provider: captcha");
        assert!(store
            .fail(job.id, "blocked by provider: captcha", Some(&result), later)
            .await
            .expect("fail"));

        let stored = store.get(job.id).await.expect("get").expect("job");
        assert_eq!(stored.state, JobState::Failed);
        assert_eq!(stored.result, Some(result));
        assert_eq!(stored.finished_at, Some(later));

        let counts = store.counts().await.expect("counts");
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.pending(), 0);
    }

    #[tokio::test]
    async fn test_requeue_and_prune() {
        let store = store().await;
        let now = stored_now();
        let job = job(now);
        store.insert(&job).await.expect("insert");
        store.claim_next(now).await.expect("claim");

        assert_eq!(store.requeue_active(now).await.expect("requeue"), 1);
        let claimed = store.claim_next(now).await.expect("claim").expect("due job");
        assert_eq!(claimed.attempts, 2);

        store
            .complete(job.id, &ProviderResult::success("example.tech"), now)
            .await
            .expect("complete");
        assert_eq!(
            store
                .prune_finished(now + Duration::seconds(1))
                .await
                .expect("prune"),
            1
        );
        assert_eq!(store.counts().await.expect("counts"), JobCounts::default());
    }
}
