//! Call rate limiting for the remote service
//!
//! The [`CallRateLimiter`] is a single slot shared by every task in a batch. A task
//! holds the slot for its whole remote-call span (upload, fetch, infer) and hands it
//! back through [`CallSlot::release_after_delay`], which frees the slot only after the
//! configured delay has elapsed. The caller does not wait for that delay.
//!
//! The effect is that remote-call spans never overlap across the batch and are
//! separated by at least the configured idle time, however many tasks are active.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Global call limiter shared across all tasks
///
/// Cloning is cheap; clones share the same slot.
///
/// # Implementation
///
/// The slot is an `Arc<tokio::sync::Mutex<()>>`. Waiters are served in FIFO order.
/// Release moves the owned guard into a spawned timer task, so the slot stays taken
/// for `release_delay` after the guarded span returns.
#[derive(Clone, Debug)]
pub struct CallRateLimiter {
    slot: Arc<Mutex<()>>,
    release_delay: Duration,
}

impl CallRateLimiter {
    /// Create a limiter that enforces `release_delay` of idle time between spans
    ///
    /// # Examples
    ///
    /// ```
    /// use invoice_batch::rate_limiter::CallRateLimiter;
    /// use std::time::Duration;
    ///
    /// let limiter = CallRateLimiter::new(Duration::from_millis(500));
    /// assert_eq!(limiter.release_delay(), Duration::from_millis(500));
    /// ```
    #[must_use]
    pub fn new(release_delay: Duration) -> Self {
        Self {
            slot: Arc::new(Mutex::new(())),
            release_delay,
        }
    }

    /// Delay applied between a span's completion and the next span's start
    pub fn release_delay(&self) -> Duration {
        self.release_delay
    }

    /// Wait until the slot is free and take it
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use invoice_batch::rate_limiter::CallRateLimiter;
    /// use std::time::Duration;
    ///
    /// # async fn example() {
    /// let limiter = CallRateLimiter::new(Duration::from_millis(500));
    ///
    /// let slot = limiter.acquire().await;
    /// // ... upload, fetch content, infer ...
    /// slot.release_after_delay();
    /// # }
    /// ```
    pub async fn acquire(&self) -> CallSlot {
        let guard = self.slot.clone().lock_owned().await;
        CallSlot {
            guard: Some(guard),
            delay: self.release_delay,
        }
    }

    /// True if no span currently holds the slot and no release is pending
    pub fn is_available(&self) -> bool {
        self.slot.try_lock().is_ok()
    }
}

/// Exclusive right to run one remote-call span
///
/// Dropping a slot without calling [`release_after_delay`](Self::release_after_delay)
/// schedules the same delayed release, so an early return or a panic inside the
/// span still frees the limiter.
#[derive(Debug)]
#[must_use = "the slot is released when dropped"]
pub struct CallSlot {
    guard: Option<OwnedMutexGuard<()>>,
    delay: Duration,
}

impl CallSlot {
    /// Free the slot once the configured delay has elapsed, without blocking the caller
    pub fn release_after_delay(mut self) {
        self.schedule_release();
    }

    fn schedule_release(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };

        if self.delay.is_zero() {
            drop(guard);
            return;
        }

        let delay = self.delay;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    drop(guard);
                });
            }
            Err(_) => {
                // Runtime is gone, nobody is left to wait on the slot
                tracing::debug!("no runtime for delayed release, releasing call slot now");
                drop(guard);
            }
        }
    }
}

impl Drop for CallSlot {
    fn drop(&mut self) {
        self.schedule_release();
    }
}
