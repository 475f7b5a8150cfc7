//! regscout Queue - background checks with retries.
//!
//! Jobs are single-provider checks. A pool of workers claims due jobs from a
//! [`JobStore`] and runs them through the checker; failed attempts are
//! retried with exponential backoff, finished jobs are kept for a retention
//! window and then pruned.
//!
//! # Stores
//!
//! - [`MemoryJobStore`] - process-local map
//! - [`SqliteJobStore`] - `queue_jobs` table; survives restarts, and jobs a
//!   crashed process left active are requeued on [`JobQueue::start`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod job;
pub mod memory;
pub mod queue;
pub mod sqlite;
pub mod store;

pub use error::{QueueError, Result};
pub use job::{Job, JobCounts, JobId, JobPayload, JobState};
pub use memory::MemoryJobStore;
pub use queue::{JobQueue, QueueHandle, QueueSettings};
pub use sqlite::SqliteJobStore;
pub use store::JobStore;
