//! In-process session backend for tests.
//!
//! Counts launches and shutdowns and serves a fixed page text. A hanging
//! backend blocks every navigation until the session is shut down, the
//! way a wedged page behaves until its browser is killed.

use crate::actions::BrowserActions;
use crate::backend::{SessionBackend, SessionHandle, SessionSpec};
use crate::error::{BrowserError, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Default)]
struct MockState {
    launched: AtomicUsize,
    shut_down: AtomicUsize,
    live: AtomicUsize,
    peak_live: AtomicUsize,
    profiles: Mutex<Vec<PathBuf>>,
}

/// Counters observed by a [`MockBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockBackendStats {
    pub launched: usize,
    pub shut_down: usize,
    pub live: usize,
    pub peak_live: usize,
}

#[derive(Debug, Clone)]
pub struct MockBackend {
    state: Arc<MockState>,
    page_text: String,
    navigation_delay: Duration,
    hang: bool,
    fail_launch: bool,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
            page_text: String::new(),
            navigation_delay: Duration::ZERO,
            hang: false,
            fail_launch: false,
        }
    }

    #[must_use]
    pub fn with_page_text(mut self, text: impl Into<String>) -> Self {
        self.page_text = text.into();
        self
    }

    #[must_use]
    pub fn with_navigation_delay(mut self, delay: Duration) -> Self {
        self.navigation_delay = delay;
        self
    }

    #[must_use]
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    #[must_use]
    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn stats(&self) -> MockBackendStats {
        MockBackendStats {
            launched: self.state.launched.load(Ordering::Acquire),
            shut_down: self.state.shut_down.load(Ordering::Acquire),
            live: self.state.live.load(Ordering::Acquire),
            peak_live: self.state.peak_live.load(Ordering::Acquire),
        }
    }

    /// Profile directories of every launched session, in launch order.
    pub fn launched_profiles(&self) -> Vec<PathBuf> {
        self.state
            .profiles
            .lock()
            .expect("acquire profiles lock")
            .clone()
    }
}

#[async_trait::async_trait]
impl SessionBackend for MockBackend {
    async fn launch(&self, spec: &SessionSpec) -> Result<Box<dyn SessionHandle>> {
        if self.fail_launch {
            return Err(BrowserError::ChromiumError("launch refused".to_string()));
        }

        self.state.launched.fetch_add(1, Ordering::AcqRel);
        let live = self.state.live.fetch_add(1, Ordering::AcqRel) + 1;
        self.state.peak_live.fetch_max(live, Ordering::AcqRel);
        self.state
            .profiles
            .lock()
            .expect("acquire profiles lock")
            .push(spec.profile_dir.clone());

        let (closed_tx, closed_rx) = watch::channel(false);
        Ok(Box::new(MockHandle {
            state: Arc::clone(&self.state),
            page_text: self.page_text.clone(),
            navigation_delay: self.navigation_delay,
            hang: self.hang,
            closed_tx,
            closed_rx,
        }))
    }
}

struct MockHandle {
    state: Arc<MockState>,
    page_text: String,
    navigation_delay: Duration,
    hang: bool,
    closed_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
}

impl MockHandle {
    fn ensure_open(&self) -> Result<()> {
        if *self.closed_rx.borrow() {
            Err(BrowserError::ChromiumError("target closed".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl BrowserActions for MockHandle {
    async fn navigate(&self, _url: &str) -> Result<()> {
        self.ensure_open()?;
        if self.hang {
            let mut closed = self.closed_rx.clone();
            let _ = closed.wait_for(|closed| *closed).await;
            return Err(BrowserError::ChromiumError("target closed".to_string()));
        }
        tokio::time::sleep(self.navigation_delay).await;
        self.ensure_open()
    }

    async fn wait_for_selector(&self, _selector: &str, _timeout_ms: u64) -> Result<()> {
        self.ensure_open()
    }

    async fn extract_text(&self, _selector: &str) -> Result<String> {
        self.ensure_open()?;
        Ok(self.page_text.clone())
    }

    async fn page_content(&self) -> Result<String> {
        self.ensure_open()?;
        Ok(format!("<html><body>{}</body></html>", self.page_text))
    }
}

#[async_trait::async_trait]
impl SessionHandle for MockHandle {
    async fn shutdown(&self) -> Result<()> {
        if !self.closed_tx.send_replace(true) {
            self.state.shut_down.fetch_add(1, Ordering::AcqRel);
            self.state.live.fetch_sub(1, Ordering::AcqRel);
        }
        Ok(())
    }
}
