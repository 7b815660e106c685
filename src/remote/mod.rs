//! Remote extraction service boundary
//!
//! [`ExtractionService`] is the contract the pipeline talks to: upload a document,
//! fetch the text the service extracted from it, run a structured completion over
//! that text, and delete the uploaded file. [`HttpExtractionClient`] implements it
//! against an OpenAI-compatible file and chat-completions API.
//!
//! The pipeline never calls the service outside a [`CallSlot`](crate::rate_limiter::CallSlot)
//! span, except for `delete`, which runs after the span has been released.

use async_trait::async_trait;
use std::path::Path;

use crate::error::ExtractionError;
use crate::types::RemoteFileHandle;

mod http;
mod wire;

pub use http::HttpExtractionClient;

/// Operations offered by the remote extraction service
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Upload a local document for text extraction
    ///
    /// A missing file is reported as [`ExtractionError::NotFound`] without network I/O.
    async fn upload(&self, path: &Path) -> Result<RemoteFileHandle, ExtractionError>;

    /// Fetch the text extracted from an uploaded file
    async fn fetch_content(&self, handle: &RemoteFileHandle) -> Result<String, ExtractionError>;

    /// Run a structured completion and return the trimmed JSON text of the first choice
    async fn infer(&self, prompt: &str, system_prompt: &str) -> Result<String, ExtractionError>;

    /// Remove an uploaded file
    async fn delete(&self, handle: &RemoteFileHandle) -> Result<(), ExtractionError>;
}
