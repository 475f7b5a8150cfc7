//! regscout Checker - query execution for regscout.
//!
//! Takes a [`CheckRequest`], validates it into a [`DomainQuery`] and runs
//! one [`TaskRunner`] per provider. Results come back either as a
//! [`QueryStream`] of [`QueryEvent`]s or collected into a [`QueryReport`].
//!
//! No provider failure ever fails a query: timeouts, adapter errors and
//! panics all become `ok: false` results. Only validation can return an
//! error, and it does so before anything is scheduled.
//!
//! # Example
//!
//! ```rust,no_run
//! use regscout_cache::{MemoryCacheStore, ResultCache, DEFAULT_TTL};
//! use regscout_checker::{Aggregator, AggregatorSettings, CheckRequest, RunnerSettings, TaskRunner};
//! use regscout_provider::ProviderRegistry;
//! use std::sync::Arc;
//!
//! # async fn example(registry: ProviderRegistry) -> Result<(), Box<dyn std::error::Error>> {
//! let cache = ResultCache::new(Arc::new(MemoryCacheStore::new()), DEFAULT_TTL);
//! let runner = TaskRunner::new(cache, RunnerSettings::default());
//! let aggregator = Aggregator::new(Arc::new(registry), runner, AggregatorSettings::default());
//!
//! let report = aggregator.check(&CheckRequest::new("example.tech")).await?;
//! println!("any provider answered: {}", report.ok);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod aggregator;
pub mod error;
pub mod event;
pub mod query;
pub mod runner;

pub use aggregator::{Aggregator, AggregatorSettings, DisconnectPolicy, QueryStream};
pub use error::{CheckError, Result};
pub use event::{DoneSummary, QueryEvent, QueryReport};
pub use query::{CheckRequest, DomainQuery, QueryLimits};
pub use runner::{CacheMode, OutcomeSource, RunnerSettings, TaskOutcome, TaskRunner, HARD_CEILING_GRACE};
