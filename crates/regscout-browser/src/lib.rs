//! Browser sessions for JavaScript-heavy registrar sites.
//!
//! Provides fingerprint-randomized headless sessions behind a system-wide
//! concurrency cap, each guarded by a hard watchdog deadline that reclaims
//! it even when the work inside cannot be cancelled.

pub mod actions;
pub mod backend;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod limiter;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use actions::BrowserActions;
pub use backend::{SessionBackend, SessionHandle, SessionSpec};
pub use engine::ChromiumBackend;
pub use error::{BrowserError, Result};
pub use fingerprint::FingerprintConfig;
pub use limiter::{ConcurrencyLimiter, SessionPermit};
pub use session::{
    BrowserSession, ProfilePolicy, SessionManager, SessionOptions, SessionSettings, SessionStats,
};
