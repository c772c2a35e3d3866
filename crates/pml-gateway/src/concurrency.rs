//! Concurrency control for `tools/call` dispatch (§4.1, §5): up to
//! `maxConcurrent` requests run at once; additional requests wait in a
//! bounded FIFO up to `queueCapacity`, beyond which the gateway answers
//! immediately with the JSON-RPC `-32000` backpressure error.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// The queue is already at capacity; the caller should surface `-32000`.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("backpressure: too many in-flight and queued requests")]
pub struct BackpressureError;

/// Admits up to `max_concurrent` concurrent holders of its permit, with
/// a bounded wait line behind it (§5 "Backpressure").
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    waiting: Arc<AtomicUsize>,
    queue_capacity: usize,
}

impl ConcurrencyLimiter {
    /// Build a limiter admitting `max_concurrent` at once, queueing up
    /// to `queue_capacity` more before rejecting.
    #[must_use]
    pub fn new(max_concurrent: usize, queue_capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            waiting: Arc::new(AtomicUsize::new(0)),
            queue_capacity,
        }
    }

    /// Acquire a slot, queueing if none are immediately available.
    ///
    /// # Errors
    ///
    /// Returns [`BackpressureError`] if the wait line is already at
    /// `queue_capacity`, or if the limiter has been shut down.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, BackpressureError> {
        if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
            return Ok(permit);
        }

        let previously_waiting = self.waiting.fetch_add(1, Ordering::SeqCst);
        if previously_waiting >= self.queue_capacity {
            self.waiting.fetch_sub(1, Ordering::SeqCst);
            return Err(BackpressureError);
        }

        let result = Arc::clone(&self.semaphore).acquire_owned().await;
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        result.map_err(|_| BackpressureError)
    }

    /// Number of requests currently holding a slot.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.max_concurrent.saturating_sub(self.semaphore.available_permits())
    }

    /// Number of requests currently queued waiting for a slot.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_max_concurrent_immediately() {
        let limiter = ConcurrencyLimiter::new(2, 1);
        let a = limiter.acquire().await.expect("first slot");
        let b = limiter.acquire().await.expect("second slot");
        assert_eq!(limiter.in_flight(), 2);
        drop(a);
        drop(b);
    }

    #[tokio::test]
    async fn rejects_once_queue_is_full() {
        let limiter = Arc::new(ConcurrencyLimiter::new(1, 0));
        let _held = limiter.acquire().await.expect("first slot");
        let result = limiter.acquire().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn queued_caller_is_admitted_once_a_slot_frees() {
        let limiter = Arc::new(ConcurrencyLimiter::new(1, 4));
        let held = limiter.acquire().await.expect("first slot");

        let waiter_limiter = Arc::clone(&limiter);
        let waiter = tokio::spawn(async move { waiter_limiter.acquire().await });

        tokio::task::yield_now().await;
        assert_eq!(limiter.waiting(), 1);

        drop(held);
        let permit = waiter.await.expect("task joined").expect("queued acquire succeeds");
        drop(permit);
    }
}
