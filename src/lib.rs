//! # invoice-batch
//!
//! Batch extraction of structured invoice data through a remote document
//! extraction service.
//!
//! Each document in the input directory is uploaded, the text the service extracts
//! from it is run through a JSON-constrained completion, and the resulting records
//! are written to a single CSV report sorted by invoice number.
//!
//! ## Design
//!
//! - **Bounded concurrency** - tasks run in waves no wider than `max_concurrent_tasks`
//! - **Serialized remote calls** - one shared limiter keeps remote-call spans from
//!   overlapping and spaces them by `rate_limit_delay`
//! - **Contained failures** - every document yields exactly one record; failed ones
//!   become all-"N/A" rows instead of aborting the batch
//! - **Event-driven** - consumers can subscribe to batch events
//!
//! ## Quick Start
//!
//! ```no_run
//! use invoice_batch::{Config, run_batch};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_toml_file("invoice-batch.toml".as_ref())?;
//!     let report = run_batch(&config).await?;
//!
//!     println!(
//!         "{} succeeded, {} failed in {:?}",
//!         report.succeeded, report.failed, report.elapsed
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use std::sync::Arc;
use tracing::{info, warn};

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Concurrency gate for active tasks
pub mod gate;
/// Extraction pipeline: tasks and batch orchestration
pub mod pipeline;
/// Progress counters and status output
pub mod progress;
/// Prompt construction
pub mod prompt;
/// Remote-call rate limiting
pub mod rate_limiter;
/// Remote extraction service client
pub mod remote;
/// Post-success renaming of source documents
pub mod rename;
/// CSV report output
pub mod report;
/// Retry logic with configurable backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{ApiConfig, Config, IoConfig, PipelineConfig, RetryConfig};
pub use error::{Error, ExtractionError, RemoteOperation, Result};
pub use pipeline::{BatchOrchestrator, BatchReport};
pub use remote::{ExtractionService, HttpExtractionClient};
pub use rename::{FileRenamer, NoOpRenamer, RenameHandler, RenameOutcome};
pub use types::{Event, ExtractionRecord, TaskOutcome, TaskStatus, WorkItem};

/// Process every document in the configured input directory and write the report
///
/// Steps:
/// 1. Validate the configuration and resolve the API key
/// 2. Discover documents in `input_dir`
/// 3. Run them through a [`BatchOrchestrator`] backed by [`HttpExtractionClient`]
/// 4. Write the sorted records to `output_path`
///
/// An empty input directory returns an empty report without contacting the service
/// or writing a file.
///
/// # Errors
///
/// Fails only on batch-level problems: invalid configuration, missing credentials,
/// an unreadable input directory, or a report that cannot be written. Per-document
/// failures are reported through [`BatchReport::failed`].
pub async fn run_batch(config: &Config) -> Result<BatchReport> {
    config.validate()?;
    let api_key = config.resolve_api_key()?;

    let paths = utils::discover_documents(&config.io.input_dir, &config.io.document_extension).await?;
    if paths.is_empty() {
        warn!(
            input_dir = %config.io.input_dir.display(),
            extension = %config.io.document_extension,
            "No documents found"
        );
        return Ok(BatchReport {
            records: Vec::new(),
            outcomes: Vec::new(),
            succeeded: 0,
            failed: 0,
            elapsed: std::time::Duration::ZERO,
        });
    }
    info!(count = paths.len(), input_dir = %config.io.input_dir.display(), "Found documents");

    let client = HttpExtractionClient::new(&config.api, &api_key)?;
    info!(model = client.model(), "Using extraction model");

    let renamer: Arc<dyn RenameHandler> = if config.io.rename_on_success {
        Arc::new(FileRenamer::new()?)
    } else {
        Arc::new(NoOpRenamer)
    };
    let prompt = prompt::PromptBuilder::new(config.buyer_hint()?);

    let orchestrator = BatchOrchestrator::new(Arc::new(client), &config.pipeline)
        .with_renamer(renamer)
        .with_prompt(prompt);
    let report = orchestrator.run(utils::work_items(paths)).await;

    report::write_report(&config.io.output_path, &report.records)?;
    Ok(report)
}
