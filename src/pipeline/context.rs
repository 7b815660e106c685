//! Task context: shared collaborators and terminal-state bookkeeping.

use std::sync::Arc;

use crate::config::RetryConfig;
use crate::gate::ConcurrencyGate;
use crate::progress::ProgressReporter;
use crate::prompt::PromptBuilder;
use crate::rate_limiter::CallRateLimiter;
use crate::remote::ExtractionService;
use crate::rename::{RenameHandler, RenameOutcome};
use crate::types::{Event, ExtractionRecord, TaskOutcome, TaskStatus, WorkItem};

/// Collaborators shared by every task of one batch
pub(crate) struct TaskContext {
    pub(crate) service: Arc<dyn ExtractionService>,
    pub(crate) rate_limiter: CallRateLimiter,
    pub(crate) gate: ConcurrencyGate,
    pub(crate) progress: ProgressReporter,
    pub(crate) renamer: Arc<dyn RenameHandler>,
    pub(crate) prompt: PromptBuilder,
    pub(crate) retry: RetryConfig,
}

impl TaskContext {
    /// Finish an item with its extracted record.
    pub(super) async fn succeed(
        &self,
        item: WorkItem,
        record: ExtractionRecord,
        attempt: u32,
    ) -> TaskOutcome {
        self.progress
            .report(&item, Some(attempt), "Extraction succeeded");
        self.progress.emit(Event::ItemSucceeded {
            index: item.sequence_index,
            name: item.display_name(),
            attempt,
        });

        self.rename(&item, &record).await;
        self.progress.increment_processed();

        TaskOutcome {
            item,
            record,
            status: TaskStatus::Succeeded { attempt },
        }
    }

    /// Finish an item with the sentinel record.
    pub(super) fn fail(&self, item: WorkItem, reason: String) -> TaskOutcome {
        tracing::error!(
            index = item.sequence_index + 1,
            item = %item.display_name(),
            error = %reason,
            "Extraction failed, recording N/A"
        );
        self.progress.emit(Event::ItemFailed {
            index: item.sequence_index,
            name: item.display_name(),
            error: reason.clone(),
        });
        self.progress.increment_processed();

        TaskOutcome {
            item,
            record: ExtractionRecord::sentinel(),
            status: TaskStatus::Failed { reason },
        }
    }

    /// Hand a successful record to the rename collaborator; failures are only logged.
    async fn rename(&self, item: &WorkItem, record: &ExtractionRecord) {
        match self.renamer.rename(item.path(), record).await {
            Ok(RenameOutcome::Renamed(to)) => {
                self.progress.emit(Event::Renamed {
                    from: item.path.clone(),
                    to,
                });
            }
            Ok(RenameOutcome::TargetExists(target)) => {
                self.progress.emit(Event::RenameSkipped {
                    path: item.path.clone(),
                    reason: format!("{} already exists", target.display()),
                });
            }
            Ok(RenameOutcome::Skipped) => {}
            Err(e) => {
                tracing::warn!(
                    item = %item.display_name(),
                    error = %e,
                    "Failed to rename document"
                );
                self.progress.emit(Event::RenameSkipped {
                    path: item.path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
}
