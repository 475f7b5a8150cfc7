//! Seam between the session manager and the browser engine.

use crate::actions::BrowserActions;
use crate::error::Result;
use crate::fingerprint::FingerprintConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Everything an engine needs to start one isolated context.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub profile_dir: PathBuf,
    pub fingerprint: FingerprintConfig,
    pub headless: bool,
    pub navigation_timeout: Duration,
}

/// A live engine context.
///
/// `shutdown` is called exactly once by the session manager. It must close
/// every page and the context; errors are logged and otherwise ignored.
#[async_trait::async_trait]
pub trait SessionHandle: BrowserActions {
    async fn shutdown(&self) -> Result<()>;
}

/// Starts engine contexts.
#[async_trait::async_trait]
pub trait SessionBackend: Send + Sync {
    async fn launch(&self, spec: &SessionSpec) -> Result<Box<dyn SessionHandle>>;
}
