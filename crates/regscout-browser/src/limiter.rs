//! System-wide cap on simultaneous browser sessions.

use crate::error::{BrowserError, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting limiter over a fair (FIFO) semaphore.
///
/// Acquisition has no timeout of its own; callers bound the wait with their
/// own deadlines.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct SessionPermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<SessionPermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| BrowserError::LimiterClosed)?;
        Ok(SessionPermit { _permit: permit })
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<SessionPermit> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| SessionPermit { _permit: permit })
    }

    /// Return a slot. Same as dropping the permit.
    pub fn release(&self, permit: SessionPermit) {
        drop(permit);
    }

    /// Stop handing out slots; pending and future `acquire` calls fail.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let limiter = ConcurrencyLimiter::new(2);
        let a = limiter.acquire().await.expect("first permit");
        let _b = limiter.acquire().await.expect("second permit");
        assert_eq!(limiter.in_use(), 2);
        assert!(limiter.try_acquire().is_none());

        limiter.release(a);
        assert_eq!(limiter.available(), 1);
        assert!(limiter.try_acquire().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_resumes_after_release() {
        let limiter = ConcurrencyLimiter::new(1);
        let held = limiter.acquire().await.expect("permit");

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire().await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.expect("join").expect("acquired after release");
    }

    #[test]
    fn test_waiters_served_in_arrival_order() {
        use tokio_test::{assert_pending, assert_ready_ok, task};

        let limiter = ConcurrencyLimiter::new(1);
        let held = limiter.try_acquire().expect("permit");

        let mut first = task::spawn(limiter.acquire());
        let mut second = task::spawn(limiter.acquire());
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        drop(held);
        assert!(first.is_woken());
        assert_pending!(second.poll());
        let permit = assert_ready_ok!(first.poll());

        drop(permit);
        assert_ready_ok!(second.poll());
    }

    #[tokio::test]
    async fn test_closed_limiter_rejects() {
        let limiter = ConcurrencyLimiter::new(1);
        limiter.close();
        assert!(matches!(
            limiter.acquire().await,
            Err(BrowserError::LimiterClosed)
        ));
    }
}
