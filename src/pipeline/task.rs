//! Extraction task lifecycle for a single item.

use tokio::sync::OnceCell;

use crate::error::ExtractionError;
use crate::retry::with_retry;
use crate::types::{Event, ExtractionRecord, RemoteFileHandle, TaskOutcome, WorkItem};

use super::context::TaskContext;

/// Drive one item to a terminal state and return its outcome.
///
/// Phases:
/// 1. Enter the concurrency gate (held until this function returns)
/// 2. Check the document exists; a missing file fails without remote calls
/// 3. Retry loop: each attempt takes the call slot, uploads on first need, fetches
///    the extracted text and runs the completion
/// 4. Delete the uploaded file, exactly once, whatever the loop returned
/// 5. Parse the completion; parse failures are not retried
///
/// Exactly one outcome is produced and the processed counter advances exactly once.
pub(crate) async fn run_extraction_task(ctx: &TaskContext, item: WorkItem) -> TaskOutcome {
    let _permit = match ctx.gate.enter().await {
        Ok(permit) => permit,
        Err(e) => return ctx.fail(item, e.to_string()),
    };

    ctx.progress.emit(Event::ItemStarted {
        index: item.sequence_index,
        name: item.display_name(),
    });
    ctx.progress.report(&item, None, "Processing document");

    match tokio::fs::try_exists(item.path()).await {
        Ok(true) => {}
        Ok(false) | Err(_) => {
            let err = ExtractionError::NotFound {
                path: item.path.clone(),
            };
            return ctx.fail(item, err.to_string());
        }
    }

    // Upload happens at most once; later attempts reuse the handle
    let handle: OnceCell<RemoteFileHandle> = OnceCell::new();
    let result = with_retry(&ctx.retry, |attempt| {
        run_attempt(ctx, &item, &handle, attempt)
    })
    .await;

    if let Some(handle) = handle.get() {
        cleanup(ctx, &item, handle).await;
    }

    match result {
        Ok((attempt, content)) => match ExtractionRecord::from_json(&content) {
            Ok(record) => ctx.succeed(item, record, attempt).await,
            Err(e) => ctx.fail(item, e.to_string()),
        },
        Err(e) => ctx.fail(item, e.to_string()),
    }
}

/// One attempt: the whole remote-call span runs inside a single call slot.
async fn run_attempt(
    ctx: &TaskContext,
    item: &WorkItem,
    handle: &OnceCell<RemoteFileHandle>,
    attempt: u32,
) -> Result<(u32, String), ExtractionError> {
    let slot = ctx.rate_limiter.acquire().await;
    let result = remote_span(ctx, item, handle).await;
    slot.release_after_delay();

    match result {
        Ok(content) => {
            ctx.progress
                .report(item, Some(attempt), "Remote extraction completed");
            Ok((attempt, content))
        }
        Err(e) => {
            tracing::warn!(
                index = item.sequence_index + 1,
                item = %item.display_name(),
                attempt,
                max_attempts = ctx.retry.max_attempts,
                error = %e,
                "Extraction attempt failed"
            );
            ctx.progress.emit(Event::AttemptFailed {
                index: item.sequence_index,
                attempt,
                max_attempts: ctx.retry.max_attempts,
                error: e.to_string(),
            });
            Err(e)
        }
    }
}

async fn remote_span(
    ctx: &TaskContext,
    item: &WorkItem,
    handle: &OnceCell<RemoteFileHandle>,
) -> Result<String, ExtractionError> {
    let handle = handle
        .get_or_try_init(|| ctx.service.upload(item.path()))
        .await?;
    let content = ctx.service.fetch_content(handle).await?;
    let prompt = ctx.prompt.user_prompt(&content);
    ctx.service
        .infer(&prompt, ctx.prompt.system_prompt())
        .await
}

/// Delete the uploaded file; failures are logged and reported, never escalated.
async fn cleanup(ctx: &TaskContext, item: &WorkItem, handle: &RemoteFileHandle) {
    match ctx.service.delete(handle).await {
        Ok(()) => {
            tracing::debug!(item = %item.display_name(), file_id = %handle, "Deleted remote file");
        }
        Err(e) => {
            let err = ExtractionError::Cleanup {
                file_id: handle.id().to_string(),
                reason: e.to_string(),
            };
            tracing::warn!(
                index = item.sequence_index + 1,
                item = %item.display_name(),
                file_id = %handle,
                error = %err,
                "Remote cleanup failed"
            );
            ctx.progress.emit(Event::CleanupFailed {
                index: item.sequence_index,
                file_id: handle.id().to_string(),
                error: e.to_string(),
            });
        }
    }
}
