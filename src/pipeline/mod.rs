//! Bounded-concurrency extraction pipeline
//!
//! Split into focused submodules:
//! - [`context`] - Shared per-batch state handed to every task
//! - [`task`] - Lifecycle of one item: upload, fetch, infer, cleanup, parse
//! - [`orchestrator`] - Wave scheduling, result aggregation and ordering
//!
//! Every item yields exactly one [`ExtractionRecord`](crate::types::ExtractionRecord),
//! real or sentinel. Per-item failures never escape a task.

mod context;
mod orchestrator;
mod task;


pub use orchestrator::{BatchOrchestrator, BatchReport};
