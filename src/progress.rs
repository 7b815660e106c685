//! Progress reporting shared by concurrent tasks
//!
//! Log lines go through `tracing`; the installed subscriber writes each event as one
//! timestamped line, so messages from concurrent tasks never interleave mid-line.
//! Milestones are also published as [`Event`]s on a broadcast channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

use crate::types::{Event, WorkItem};

/// Thread-safe progress counters and status emission for one batch
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    processed: AtomicUsize,
    total: usize,
    event_tx: broadcast::Sender<Event>,
}

impl ProgressReporter {
    /// Create a reporter for a batch of `total` items
    pub fn new(total: usize, event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            inner: Arc::new(Inner {
                processed: AtomicUsize::new(0),
                total,
                event_tx,
            }),
        }
    }

    /// Emit one status line for an item, tagged with its attempt when known
    pub fn report(&self, item: &WorkItem, attempt: Option<u32>, message: &str) {
        let position = item.sequence_index + 1;
        match attempt {
            Some(attempt) => tracing::info!(
                index = position,
                total = self.inner.total,
                item = %item.display_name(),
                attempt,
                "{message}"
            ),
            None => tracing::info!(
                index = position,
                total = self.inner.total,
                item = %item.display_name(),
                "{message}"
            ),
        }
    }

    /// Mark one more item terminal and return the new processed count
    ///
    /// Emits a [`Event::Progress`] carrying `current * 100 / total`.
    pub fn increment_processed(&self) -> usize {
        let current = self.inner.processed.fetch_add(1, Ordering::SeqCst) + 1;
        debug_assert!(
            current <= self.inner.total,
            "processed count exceeded batch size"
        );
        let percent = percent(current, self.inner.total);
        tracing::info!(
            processed = current,
            total = self.inner.total,
            "Progress: {}/{} ({}%)",
            current,
            self.inner.total,
            percent
        );
        self.emit(Event::Progress {
            processed: current,
            total: self.inner.total,
            percent,
            timestamp: chrono::Utc::now(),
        });
        current
    }

    /// Items that reached a terminal state so far
    pub fn processed(&self) -> usize {
        self.inner.processed.load(Ordering::SeqCst)
    }

    /// Items in the batch
    pub fn total(&self) -> usize {
        self.inner.total
    }

    /// Publish an event; having no subscribers is not an error
    pub fn emit(&self, event: Event) {
        self.inner.event_tx.send(event).ok();
    }
}

fn percent(current: usize, total: usize) -> usize {
    if total == 0 {
        return 100;
    }
    current * 100 / total
}
