//! Row access for the `queue_jobs` table.
//!
//! State transitions are single statements so concurrent workers sharing
//! the pool can never claim the same job twice.

use sqlx::SqlitePool;

/// Job is waiting for its `run_at` time.
pub const STATE_WAITING: &str = "waiting";
/// Job is being processed by a worker.
pub const STATE_ACTIVE: &str = "active";
/// Job finished successfully.
pub const STATE_COMPLETED: &str = "completed";
/// Job exhausted its attempts.
pub const STATE_FAILED: &str = "failed";

const JOB_COLUMNS: &str = "id, provider, domain, timeout_ms, state, attempts, max_attempts, \
     run_at, last_error, result, created_at, updated_at, finished_at";

/// A stored job row. Timestamps are unix epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct JobRow {
    /// Job identifier
    pub id: String,
    /// Provider wire name
    pub provider: String,
    /// Normalized domain
    pub domain: String,
    /// Logical timeout for the check
    pub timeout_ms: i64,
    /// One of the `STATE_*` constants
    pub state: String,
    /// Attempts started so far
    pub attempts: i64,
    /// Attempt cap
    pub max_attempts: i64,
    /// Earliest time the job may run
    pub run_at: i64,
    /// Error of the last failed attempt
    pub last_error: Option<String>,
    /// Serialized result of the final attempt
    pub result: Option<String>,
    /// Creation time
    pub created_at: i64,
    /// Last transition time
    pub updated_at: i64,
    /// Time the job reached a terminal state
    pub finished_at: Option<i64>,
}

/// Insert a new job row as given.
pub async fn insert_job(pool: &SqlitePool, job: &JobRow) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO queue_jobs (id, provider, domain, timeout_ms, state, attempts, max_attempts,
                                 run_at, last_error, result, created_at, updated_at, finished_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&job.id)
    .bind(&job.provider)
    .bind(&job.domain)
    .bind(job.timeout_ms)
    .bind(&job.state)
    .bind(job.attempts)
    .bind(job.max_attempts)
    .bind(job.run_at)
    .bind(&job.last_error)
    .bind(&job.result)
    .bind(job.created_at)
    .bind(job.updated_at)
    .bind(job.finished_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Atomically move the next due waiting job to `active`, counting the attempt.
pub async fn claim_next(pool: &SqlitePool, now_ms: i64) -> Result<Option<JobRow>, sqlx::Error> {
    let sql = format!(
        "UPDATE queue_jobs
         SET state = '{STATE_ACTIVE}', attempts = attempts + 1, updated_at = ?
         WHERE id = (
             SELECT id FROM queue_jobs
             WHERE state = '{STATE_WAITING}' AND run_at <= ?
             ORDER BY run_at, created_at
             LIMIT 1
         )
         RETURNING {JOB_COLUMNS}"
    );

    sqlx::query_as::<_, JobRow>(&sql)
        .bind(now_ms)
        .bind(now_ms)
        .fetch_optional(pool)
        .await
}

/// Mark an active job completed with its serialized result.
pub async fn mark_completed(
    pool: &SqlitePool,
    id: &str,
    result: &str,
    now_ms: i64,
) -> Result<bool, sqlx::Error> {
    let outcome = sqlx::query(
        "UPDATE queue_jobs
         SET state = ?, result = ?, updated_at = ?, finished_at = ?
         WHERE id = ? AND state = ?",
    )
    .bind(STATE_COMPLETED)
    .bind(result)
    .bind(now_ms)
    .bind(now_ms)
    .bind(id)
    .bind(STATE_ACTIVE)
    .execute(pool)
    .await?;

    Ok(outcome.rows_affected() > 0)
}

/// Return an active job to `waiting`, due at `run_at_ms`.
pub async fn schedule_retry(
    pool: &SqlitePool,
    id: &str,
    error: &str,
    run_at_ms: i64,
    now_ms: i64,
) -> Result<bool, sqlx::Error> {
    let outcome = sqlx::query(
        "UPDATE queue_jobs
         SET state = ?, last_error = ?, run_at = ?, updated_at = ?
         WHERE id = ? AND state = ?",
    )
    .bind(STATE_WAITING)
    .bind(error)
    .bind(run_at_ms)
    .bind(now_ms)
    .bind(id)
    .bind(STATE_ACTIVE)
    .execute(pool)
    .await?;

    Ok(outcome.rows_affected() > 0)
}

/// Mark an active job failed, keeping the final result if there is one.
pub async fn mark_failed(
    pool: &SqlitePool,
    id: &str,
    error: &str,
    result: Option<&str>,
    now_ms: i64,
) -> Result<bool, sqlx::Error> {
    let outcome = sqlx::query(
        "UPDATE queue_jobs
         SET state = ?, last_error = ?, result = ?, updated_at = ?, finished_at = ?
         WHERE id = ? AND state = ?",
    )
    .bind(STATE_FAILED)
    .bind(error)
    .bind(result)
    .bind(now_ms)
    .bind(now_ms)
    .bind(id)
    .bind(STATE_ACTIVE)
    .execute(pool)
    .await?;

    Ok(outcome.rows_affected() > 0)
}

/// Fetch one job by id.
pub async fn get_job(pool: &SqlitePool, id: &str) -> Result<Option<JobRow>, sqlx::Error> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM queue_jobs WHERE id = ?");
    sqlx::query_as::<_, JobRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Number of jobs per state.
pub async fn count_by_state(pool: &SqlitePool) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        "SELECT state, COUNT(*) FROM queue_jobs GROUP BY state ORDER BY state",
    )
    .fetch_all(pool)
    .await
}

/// Delete terminal jobs that finished before `before_ms`.
pub async fn prune_finished(pool: &SqlitePool, before_ms: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM queue_jobs
         WHERE state IN (?, ?) AND finished_at IS NOT NULL AND finished_at < ?",
    )
    .bind(STATE_COMPLETED)
    .bind(STATE_FAILED)
    .bind(before_ms)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Return every `active` job to `waiting`. Used at startup to recover jobs
/// a crashed process had claimed; the interrupted attempt still counts.
pub async fn requeue_active(pool: &SqlitePool, now_ms: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE queue_jobs SET state = ?, run_at = ?, updated_at = ? WHERE state = ?",
    )
    .bind(STATE_WAITING)
    .bind(now_ms)
    .bind(now_ms)
    .bind(STATE_ACTIVE)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
