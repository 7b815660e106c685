//! Concurrency gate bounding the number of active extraction tasks

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Error, Result};

/// Counting gate of fixed width
///
/// A task enters once and holds its [`GatePermit`] for its entire lifetime, including
/// every retry attempt and the cleanup call. The gate therefore bounds how many tasks
/// are active, not how many are talking to the service; that finer bound belongs to
/// [`CallRateLimiter`](crate::rate_limiter::CallRateLimiter).
#[derive(Clone, Debug)]
pub struct ConcurrencyGate {
    permits: Arc<Semaphore>,
    width: usize,
}

/// Held while a task is active; dropping it exits the gate
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// Create a gate admitting `width` tasks at once
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(width)),
            width,
        }
    }

    /// Wait for a free slot and enter the gate
    pub async fn enter(&self) -> Result<GatePermit> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Other("concurrency gate closed".to_string()))?;
        Ok(GatePermit { _permit: permit })
    }

    /// Configured width
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of tasks currently inside the gate
    pub fn active(&self) -> usize {
        self.width - self.permits.available_permits()
    }
}
