//! Error types for invoice-batch
//!
//! This module provides the error handling for the library:
//! - [`Error`], the crate-wide error returned from configuration, discovery and
//!   report writing
//! - [`ExtractionError`], the per-item failure taxonomy raised by remote calls and
//!   response parsing, which never escapes a task
//! - [`RemoteOperation`], naming the remote call that failed

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for invoice-batch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for invoice-batch
///
/// Per-item extraction failures are contained inside the pipeline and turned into
/// sentinel records. This type surfaces only from the batch boundary: loading
/// configuration, resolving credentials, discovering documents and writing the report.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "input_dir")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Extraction error raised outside a task (e.g. building the HTTP client)
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Report writing failed
    #[error("report error: {0}")]
    Report(#[from] csv::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a configuration key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// The remote call an [`ExtractionError`] originated from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteOperation {
    /// Multipart upload of the source document
    Upload,
    /// Retrieval of the extracted text for an uploaded file
    FetchContent,
    /// Structured chat completion
    Infer,
    /// Removal of the uploaded file
    Delete,
}

impl std::fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RemoteOperation::Upload => "upload",
            RemoteOperation::FetchContent => "fetch-content",
            RemoteOperation::Infer => "infer",
            RemoteOperation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Failures of a single extraction attempt
///
/// `Transport`, `HttpStatus` and `MalformedResponse` are transport-class failures and
/// are retried. `NotFound` and `Parse` end the task with a sentinel record.
/// `Cleanup` is only ever logged.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Network or I/O failure while talking to the remote service
    #[error("{operation} failed: {reason}")]
    Transport {
        /// The remote call that failed
        operation: RemoteOperation,
        /// Underlying error message
        reason: String,
    },

    /// Remote service answered with a non-success status
    #[error("{operation} returned HTTP {status}: {body}")]
    HttpStatus {
        /// The remote call that failed
        operation: RemoteOperation,
        /// HTTP status code
        status: u16,
        /// Response body (possibly empty)
        body: String,
    },

    /// Response envelope could not be decoded
    #[error("malformed {operation} response: {reason}")]
    MalformedResponse {
        /// The remote call whose response was malformed
        operation: RemoteOperation,
        /// Decoder error message
        reason: String,
    },

    /// Local document does not exist
    #[error("document not found: {}", path.display())]
    NotFound {
        /// The missing path
        path: PathBuf,
    },

    /// Completion content is not a valid extraction record
    #[error("failed to parse extraction result: {reason}")]
    Parse {
        /// Decoder error message
        reason: String,
    },

    /// Deleting the uploaded file failed
    #[error("failed to delete remote file {file_id}: {reason}")]
    Cleanup {
        /// Remote file id
        file_id: String,
        /// Underlying error message
        reason: String,
    },
}

impl ExtractionError {
    /// Wrap a reqwest failure for the given operation
    pub(crate) fn transport(operation: RemoteOperation, error: reqwest::Error) -> Self {
        ExtractionError::Transport {
            operation,
            reason: error.to_string(),
        }
    }

    /// Wrap an envelope decoding failure for the given operation
    pub(crate) fn malformed(operation: RemoteOperation, reason: impl std::fmt::Display) -> Self {
        ExtractionError::MalformedResponse {
            operation,
            reason: reason.to_string(),
        }
    }
}
