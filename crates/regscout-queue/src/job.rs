//! Job model.

use chrono::{DateTime, Utc};
use regscout_core::{DomainName, ProviderId};
use regscout_provider::ProviderResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle of a job.
///
/// `Waiting -> Active -> (Completed | Failed | Waiting)`; a failed attempt
/// with attempts left goes back to `Waiting` with a later `run_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Due at `run_at`
    Waiting,
    /// Claimed by a worker
    Active,
    /// Finished with a successful result
    Completed,
    /// Out of attempts
    Failed,
}

impl JobState {
    /// Stored name of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => regscout_db::queue_jobs::STATE_WAITING,
            Self::Active => regscout_db::queue_jobs::STATE_ACTIVE,
            Self::Completed => regscout_db::queue_jobs::STATE_COMPLETED,
            Self::Failed => regscout_db::queue_jobs::STATE_FAILED,
        }
    }

    /// `Completed` or `Failed`.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job state '{other}'")),
        }
    }
}

/// One provider check to run in the background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    /// Provider to ask
    pub provider: ProviderId,
    /// Normalized domain
    pub domain: DomainName,
    /// Logical timeout of each attempt
    pub timeout_ms: u64,
}

impl JobPayload {
    /// Payload for one provider check.
    #[must_use]
    pub fn new(provider: ProviderId, domain: DomainName, timeout_ms: u64) -> Self {
        Self {
            provider,
            domain,
            timeout_ms,
        }
    }
}

/// A queued check and its progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub payload: JobPayload,
    pub state: JobState,
    /// Attempts started so far, including the running one
    pub attempts: u32,
    pub max_attempts: u32,
    /// Earliest time the next attempt may start
    pub run_at: DateTime<Utc>,
    /// Error of the most recent failed attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Result of the final attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProviderResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A new waiting job, due immediately.
    #[must_use]
    pub fn new(payload: JobPayload, max_attempts: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            payload,
            state: JobState::Waiting,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            run_at: now,
            last_error: None,
            result: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Whether another attempt is allowed after the current one.
    #[must_use]
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// Number of jobs per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
}

impl JobCounts {
    pub(crate) fn add(&mut self, state: JobState, n: u64) {
        match state {
            JobState::Waiting => self.waiting += n,
            JobState::Active => self.active += n,
            JobState::Completed => self.completed += n,
            JobState::Failed => self.failed += n,
        }
    }

    /// Jobs that still have work ahead of them.
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.waiting + self.active
    }
}
