//! regscout Cache - per-provider result cache.
//!
//! Results are keyed by `(provider, normalized domain)` and kept for a
//! fixed TTL (24 hours by default). Failures are cached as well, so a
//! provider that is currently blocking is not hammered.
//!
//! # Stores
//!
//! - [`MemoryCacheStore`] - process-local map
//! - [`SqliteCacheStore`] - `cache_entries` table in the shared database
//!
//! A store that fails is treated as `CacheUnavailable`: [`ResultCache`]
//! logs and continues uncached.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod memory;
pub mod result_cache;
pub mod sqlite;
pub mod store;

pub use error::{CacheError, Result};
pub use memory::MemoryCacheStore;
pub use result_cache::{CacheKey, ResultCache, DEFAULT_TTL};
pub use sqlite::SqliteCacheStore;
pub use store::CacheStore;
