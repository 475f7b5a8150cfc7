//! Session manager: isolated, fingerprinted browser contexts with a hard
//! watchdog deadline.
//!
//! Every session holds one limiter slot from open until its resources are
//! reclaimed, so the number of open sessions never exceeds the limiter
//! capacity. Reclamation happens exactly once per session, whichever of
//! `close`, the watchdog or a drop gets there first.

use crate::actions::BrowserActions;
use crate::backend::{SessionBackend, SessionHandle, SessionSpec};
use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use crate::limiter::{ConcurrencyLimiter, SessionPermit};
use regscout_core::BrowserConfig;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upper bound on how long one engine shutdown may take.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Where a session keeps its browser profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProfilePolicy {
    /// Fresh uniquely named directory, deleted on close.
    #[default]
    Ephemeral,
    /// Named directory under the profile root, kept across sessions.
    Persistent(String),
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub profile: ProfilePolicy,
    /// Randomized when absent.
    pub fingerprint: Option<FingerprintConfig>,
}

impl SessionOptions {
    pub fn ephemeral() -> Self {
        Self::default()
    }

    pub fn persistent(name: impl Into<String>) -> Self {
        Self {
            profile: ProfilePolicy::Persistent(name.into()),
            fingerprint: None,
        }
    }
}

/// Manager-wide settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub profile_root: PathBuf,
    pub max_sessions: usize,
    pub hard_timeout: Duration,
    pub headless: bool,
    pub navigation_timeout: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &BrowserConfig, profile_root: PathBuf) -> Self {
        Self {
            profile_root,
            max_sessions: config.max_concurrent_sessions,
            hard_timeout: Duration::from_secs(config.session_hard_timeout_secs),
            headless: config.headless,
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
        }
    }
}

/// Snapshot of the session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub opened: u64,
    /// Reclaimed by `close` or by dropping the session.
    pub closed: u64,
    pub reclaimed_by_watchdog: u64,
    pub open_now: usize,
    pub peak_open: usize,
}

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicU64,
    closed: AtomicU64,
    reclaimed_by_watchdog: AtomicU64,
    open_now: AtomicUsize,
    peak_open: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReclaimCause {
    Close,
    Drop,
    Watchdog,
}

#[derive(Debug, Clone)]
enum ProfileClaim {
    Ephemeral,
    Persistent(String),
}

struct ManagerInner {
    backend: Arc<dyn SessionBackend>,
    settings: SessionSettings,
    limiter: ConcurrencyLimiter,
    counters: Counters,
    profile_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ManagerInner {
    /// Claim a profile directory. A persistent profile is held by one
    /// session at a time; later claimants wait for it.
    async fn claim_profile(
        &self,
        policy: &ProfilePolicy,
    ) -> Result<(PathBuf, ProfileClaim, Option<OwnedMutexGuard<()>>)> {
        match policy {
            ProfilePolicy::Ephemeral => {
                let dir = self
                    .settings
                    .profile_root
                    .join(format!("profile-{}", Uuid::new_v4()));
                Ok((dir, ProfileClaim::Ephemeral, None))
            }
            ProfilePolicy::Persistent(name) => {
                validate_profile_name(name)?;
                let lock = Arc::clone(
                    self.profile_locks
                        .lock()
                        .expect("acquire profiles lock")
                        .entry(name.clone())
                        .or_default(),
                );
                let guard = lock.lock_owned().await;
                let dir = self.settings.profile_root.join(name);
                Ok((dir, ProfileClaim::Persistent(name.clone()), Some(guard)))
            }
        }
    }

    async fn remove_ephemeral(&self, dir: &Path, claim: &ProfileClaim) {
        if let ProfileClaim::Ephemeral = claim {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => debug!("Removed ephemeral profile {}", dir.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove profile {}: {}", dir.display(), e),
            }
        }
    }
}

fn validate_profile_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(BrowserError::InvalidProfileName(name.to_string()))
    }
}

/// Opens and tracks browser sessions.
///
/// Cheap to clone; clones share the limiter and counters.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn SessionBackend>, settings: SessionSettings) -> Self {
        let limiter = ConcurrencyLimiter::new(settings.max_sessions);
        Self {
            inner: Arc::new(ManagerInner {
                backend,
                settings,
                limiter,
                counters: Counters::default(),
                profile_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Open a session, waiting for its persistent profile (if any) and
    /// then for a limiter slot.
    ///
    /// The session's watchdog starts once the engine context is up.
    pub async fn open(&self, options: SessionOptions) -> Result<BrowserSession> {
        let (profile_dir, claim, profile_guard) =
            self.inner.claim_profile(&options.profile).await?;
        let permit = self.inner.limiter.acquire().await?;

        if let Err(e) = tokio::fs::create_dir_all(&profile_dir).await {
            self.inner.remove_ephemeral(&profile_dir, &claim).await;
            return Err(e.into());
        }

        let spec = SessionSpec {
            profile_dir: profile_dir.clone(),
            fingerprint: options
                .fingerprint
                .unwrap_or_else(FingerprintConfig::randomized),
            headless: self.inner.settings.headless,
            navigation_timeout: self.inner.settings.navigation_timeout,
        };

        let handle = match self.inner.backend.launch(&spec).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to launch browser session: {}", e);
                self.inner.remove_ephemeral(&profile_dir, &claim).await;
                return Err(e);
            }
        };

        let counters = &self.inner.counters;
        counters.opened.fetch_add(1, Ordering::Relaxed);
        let open_now = counters.open_now.fetch_add(1, Ordering::AcqRel) + 1;
        counters.peak_open.fetch_max(open_now, Ordering::AcqRel);

        let id = Uuid::new_v4();
        let hard_deadline = Instant::now() + self.inner.settings.hard_timeout;
        let session = Arc::new(SessionInner {
            id,
            profile_dir,
            claim,
            handle,
            hard_deadline,
            reclaimed: AtomicBool::new(false),
            manager: Arc::clone(&self.inner),
            profile_guard: Mutex::new(profile_guard),
            permit: Mutex::new(Some(permit)),
            watchdog: Mutex::new(None),
        });

        let watched = Arc::clone(&session);
        let watchdog = tokio::spawn(async move {
            tokio::time::sleep_until(watched.hard_deadline).await;
            if watched.reclaim(ReclaimCause::Watchdog).await {
                warn!(session = %watched.id, "watchdog reclaimed session at hard deadline");
            }
        });
        *session.watchdog.lock().expect("acquire watchdog lock") = Some(watchdog);

        info!(session = %id, open_now, "browser session opened");
        Ok(BrowserSession { inner: session })
    }

    pub fn stats(&self) -> SessionStats {
        let counters = &self.inner.counters;
        SessionStats {
            opened: counters.opened.load(Ordering::Acquire),
            closed: counters.closed.load(Ordering::Acquire),
            reclaimed_by_watchdog: counters.reclaimed_by_watchdog.load(Ordering::Acquire),
            open_now: counters.open_now.load(Ordering::Acquire),
            peak_open: counters.peak_open.load(Ordering::Acquire),
        }
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.inner.limiter
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    /// Refuse new sessions. Open sessions are left to their owners and
    /// watchdogs.
    pub fn shutdown(&self) {
        self.inner.limiter.close();
        info!(open = self.stats().open_now, "session manager shut down");
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("settings", &self.inner.settings)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

struct SessionInner {
    id: Uuid,
    profile_dir: PathBuf,
    claim: ProfileClaim,
    handle: Box<dyn SessionHandle>,
    hard_deadline: Instant,
    reclaimed: AtomicBool,
    manager: Arc<ManagerInner>,
    profile_guard: Mutex<Option<OwnedMutexGuard<()>>>,
    permit: Mutex<Option<SessionPermit>>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
}

impl SessionInner {
    /// Tear the session down. Returns false if it was already reclaimed.
    async fn reclaim(&self, cause: ReclaimCause) -> bool {
        if self
            .reclaimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, self.handle.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(session = %self.id, "engine shutdown failed: {}", e),
            Err(_) => warn!(session = %self.id, "engine shutdown did not finish in time"),
        }

        self.manager
            .remove_ephemeral(&self.profile_dir, &self.claim)
            .await;
        drop(self.profile_guard.lock().expect("acquire profile lock").take());

        let counters = &self.manager.counters;
        match cause {
            ReclaimCause::Close | ReclaimCause::Drop => {
                counters.closed.fetch_add(1, Ordering::AcqRel);
            }
            ReclaimCause::Watchdog => {
                counters.reclaimed_by_watchdog.fetch_add(1, Ordering::AcqRel);
            }
        }
        counters.open_now.fetch_sub(1, Ordering::AcqRel);

        // slot is returned only after the engine context is gone
        drop(self.permit.lock().expect("acquire permit lock").take());

        debug!(session = %self.id, ?cause, "session reclaimed");
        true
    }

    fn abort_watchdog(&self) {
        if let Some(watchdog) = self.watchdog.lock().expect("acquire watchdog lock").take() {
            watchdog.abort();
        }
    }
}

/// An open browser session.
///
/// Page operations fail with `BrowserError::SessionReclaimed` once the
/// session has been reclaimed.
pub struct BrowserSession {
    inner: Arc<SessionInner>,
}

impl BrowserSession {
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn profile_dir(&self) -> &Path {
        &self.inner.profile_dir
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self.inner.claim, ProfileClaim::Ephemeral)
    }

    pub fn hard_deadline(&self) -> Instant {
        self.inner.hard_deadline
    }

    pub fn is_reclaimed(&self) -> bool {
        self.inner.reclaimed.load(Ordering::Acquire)
    }

    /// Close the session. Idempotent; a no-op after the watchdog fired.
    pub async fn close(&self) {
        if self.inner.reclaim(ReclaimCause::Close).await {
            self.inner.abort_watchdog();
        }
    }

    async fn guarded<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        if self.is_reclaimed() {
            return Err(BrowserError::SessionReclaimed);
        }
        match op.await {
            Err(_) if self.is_reclaimed() => Err(BrowserError::SessionReclaimed),
            other => other,
        }
    }
}

#[async_trait::async_trait]
impl BrowserActions for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.guarded(self.inner.handle.navigate(url)).await
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        self.guarded(self.inner.handle.wait_for_selector(selector, timeout_ms))
            .await
    }

    async fn extract_text(&self, selector: &str) -> Result<String> {
        self.guarded(self.inner.handle.extract_text(selector)).await
    }

    async fn page_content(&self) -> Result<String> {
        self.guarded(self.inner.handle.page_content()).await
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.is_reclaimed() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            // the watchdog task owns a reference and will reclaim
            return;
        };
        warn!(session = %self.inner.id, "session dropped without close");
        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            if inner.reclaim(ReclaimCause::Drop).await {
                inner.abort_watchdog();
            }
        });
    }
}

impl fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserSession")
            .field("id", &self.inner.id)
            .field("profile_dir", &self.inner.profile_dir)
            .field("reclaimed", &self.is_reclaimed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use tempfile::TempDir;

    async fn wait_until_none_open(sessions: &SessionManager) {
        while sessions.stats().open_now > 0 {
            tokio::task::yield_now().await;
        }
    }

    fn manager(backend: &MockBackend, root: &Path, max_sessions: usize) -> SessionManager {
        SessionManager::new(
            Arc::new(backend.clone()),
            SessionSettings {
                profile_root: root.to_path_buf(),
                max_sessions,
                hard_timeout: Duration::from_secs(200),
                headless: true,
                navigation_timeout: Duration::from_secs(30),
            },
        )
    }

    #[tokio::test]
    async fn test_ephemeral_profile_removed_on_close() {
        let tmp = TempDir::new().expect("create temp dir");
        let backend = MockBackend::new();
        let sessions = manager(&backend, tmp.path(), 2);

        let session = sessions
            .open(SessionOptions::ephemeral())
            .await
            .expect("open session");
        let dir = session.profile_dir().to_path_buf();
        assert!(dir.exists());
        assert!(dir
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("profile-")));

        session.close().await;
        assert!(!dir.exists());
        assert_eq!(backend.stats().shut_down, 1);

        let stats = sessions.stats();
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.open_now, 0);
    }

    #[tokio::test]
    async fn test_ephemeral_profiles_are_unique() {
        let tmp = TempDir::new().expect("create temp dir");
        let backend = MockBackend::new();
        let sessions = manager(&backend, tmp.path(), 2);

        let a = sessions.open(SessionOptions::ephemeral()).await.expect("a");
        let b = sessions.open(SessionOptions::ephemeral()).await.expect("b");
        assert_ne!(a.profile_dir(), b.profile_dir());

        a.close().await;
        b.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_profile_kept_and_exclusive() {
        let tmp = TempDir::new().expect("create temp dir");
        let backend = MockBackend::new();
        let sessions = manager(&backend, tmp.path(), 4);

        let first = sessions
            .open(SessionOptions::persistent("porkbun"))
            .await
            .expect("open persistent");
        assert!(!first.is_ephemeral());

        let second = {
            let sessions = sessions.clone();
            tokio::spawn(async move { sessions.open(SessionOptions::persistent("porkbun")).await })
        };
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!second.is_finished());
        // the waiter holds no slot while queued for the profile
        assert_eq!(sessions.limiter().in_use(), 1);

        first.close().await;
        assert!(tmp.path().join("porkbun").exists());

        let second = second.await.expect("join").expect("open after close");
        assert_eq!(second.profile_dir(), tmp.path().join("porkbun"));
        assert_eq!(sessions.stats().peak_open, 1);
        second.close().await;
    }

    #[tokio::test]
    async fn test_distinct_persistent_profiles_run_together() {
        let tmp = TempDir::new().expect("create temp dir");
        let backend = MockBackend::new();
        let sessions = manager(&backend, tmp.path(), 4);

        let a = sessions
            .open(SessionOptions::persistent("main-hover"))
            .await
            .expect("open a");
        let b = sessions
            .open(SessionOptions::persistent("main-gandi"))
            .await
            .expect("open b");
        assert_eq!(sessions.stats().open_now, 2);

        a.close().await;
        b.close().await;
    }

    #[tokio::test]
    async fn test_invalid_profile_name() {
        let tmp = TempDir::new().expect("create temp dir");
        let backend = MockBackend::new();
        let sessions = manager(&backend, tmp.path(), 1);

        let result = sessions.open(SessionOptions::persistent("../escape")).await;
        assert!(matches!(result, Err(BrowserError::InvalidProfileName(_))));
        assert_eq!(sessions.limiter().available(), 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let tmp = TempDir::new().expect("create temp dir");
        let backend = MockBackend::new();
        let sessions = manager(&backend, tmp.path(), 1);

        let session = sessions.open(SessionOptions::ephemeral()).await.expect("open");
        session.close().await;
        session.close().await;

        assert_eq!(backend.stats().shut_down, 1);
        assert_eq!(sessions.stats().closed, 1);
        assert!(matches!(
            session.navigate("https://example.com").await,
            Err(BrowserError::SessionReclaimed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_reclaims_exactly_once() {
        let tmp = TempDir::new().expect("create temp dir");
        let backend = MockBackend::new();
        let sessions = manager(&backend, tmp.path(), 1);

        let session = sessions.open(SessionOptions::ephemeral()).await.expect("open");
        let dir = session.profile_dir().to_path_buf();

        tokio::time::sleep(Duration::from_secs(199)).await;
        assert!(!session.is_reclaimed());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(session.is_reclaimed());
        wait_until_none_open(&sessions).await;
        assert!(!dir.exists());

        session.close().await;

        let stats = sessions.stats();
        assert_eq!(stats.reclaimed_by_watchdog, 1);
        assert_eq!(stats.closed, 0);
        assert_eq!(stats.open_now, 0);
        assert_eq!(backend.stats().shut_down, 1);
        assert_eq!(sessions.limiter().available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_interrupts_hung_operation() {
        let tmp = TempDir::new().expect("create temp dir");
        let backend = MockBackend::new().hanging();
        let sessions = manager(&backend, tmp.path(), 1);

        let session = sessions.open(SessionOptions::ephemeral()).await.expect("open");
        let result = session.navigate("https://example.com").await;

        assert!(matches!(result, Err(BrowserError::SessionReclaimed)));
        wait_until_none_open(&sessions).await;
        assert_eq!(sessions.stats().reclaimed_by_watchdog, 1);
    }

    #[tokio::test]
    async fn test_failed_launch_releases_everything() {
        let tmp = TempDir::new().expect("create temp dir");
        let backend = MockBackend::new().failing_launch();
        let sessions = manager(&backend, tmp.path(), 1);

        let result = sessions.open(SessionOptions::ephemeral()).await;
        assert!(result.is_err());
        assert_eq!(sessions.limiter().available(), 1);
        assert_eq!(sessions.stats().opened, 0);

        let leftovers = std::fs::read_dir(tmp.path()).expect("read root").count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_burst_never_exceeds_capacity() {
        let tmp = TempDir::new().expect("create temp dir");
        let backend = MockBackend::new().with_navigation_delay(Duration::from_millis(20));
        let sessions = manager(&backend, tmp.path(), 3);

        let tasks: Vec<_> = (0..24)
            .map(|_| {
                let sessions = sessions.clone();
                tokio::spawn(async move {
                    let session = sessions.open(SessionOptions::ephemeral()).await?;
                    let navigated = session.navigate("https://example.com").await;
                    session.close().await;
                    navigated
                })
            })
            .collect();

        for task in tasks {
            task.await.expect("join").expect("session work");
        }

        let stats = sessions.stats();
        assert_eq!(stats.opened, 24);
        assert_eq!(stats.closed, 24);
        assert_eq!(stats.open_now, 0);
        assert!(stats.peak_open <= 3, "peak was {}", stats.peak_open);
        assert!(backend.stats().peak_live <= 3);
    }

    #[tokio::test]
    async fn test_dropped_session_is_reclaimed() {
        let tmp = TempDir::new().expect("create temp dir");
        let backend = MockBackend::new();
        let sessions = manager(&backend, tmp.path(), 1);

        let session = sessions.open(SessionOptions::ephemeral()).await.expect("open");
        drop(session);

        // the slot comes back once the spawned reclaim has run
        let permit = sessions.limiter().acquire().await.expect("slot freed");
        drop(permit);
        assert_eq!(sessions.stats().closed, 1);
    }
}
