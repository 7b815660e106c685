//! Core types for invoice-batch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ExtractionError;

/// Marker written into every field of a record that could not be extracted
pub const NOT_AVAILABLE: &str = "N/A";

/// One document to process
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem {
    /// Location of the source document
    pub path: PathBuf,
    /// 0-based position in the discovered order, used for log correlation only
    pub sequence_index: usize,
}

impl WorkItem {
    /// Create a work item
    pub fn new(path: impl Into<PathBuf>, sequence_index: usize) -> Self {
        Self {
            path: path.into(),
            sequence_index,
        }
    }

    /// File name for log lines, falling back to the full path
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Source path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Opaque id of a file uploaded to the remote service
///
/// Lives for a single task; the task deletes it before producing its record.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RemoteFileHandle(String);

impl RemoteFileHandle {
    /// Wrap a remote file id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The remote file id
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteFileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structured invoice data extracted from one document
///
/// Every field is a string; values are passed through as the service returned them.
/// The serialized names double as JSON keys in the completion response and as the
/// column headers of the CSV report, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// Invoice code
    #[serde(rename = "发票代码", default = "not_available", deserialize_with = "lenient_string")]
    pub invoice_code: String,
    /// Invoice number, the report sort key
    #[serde(rename = "发票号码", default = "not_available", deserialize_with = "lenient_string")]
    pub invoice_number: String,
    /// Seller tax id
    #[serde(rename = "销方识别号", default = "not_available", deserialize_with = "lenient_string")]
    pub seller_tax_id: String,
    /// Seller name
    #[serde(rename = "销方名称", default = "not_available", deserialize_with = "lenient_string")]
    pub seller_name: String,
    /// Buyer tax id
    #[serde(rename = "购方识别号", default = "not_available", deserialize_with = "lenient_string")]
    pub buyer_tax_id: String,
    /// Buyer name
    #[serde(rename = "购买方名称", default = "not_available", deserialize_with = "lenient_string")]
    pub buyer_name: String,
    /// Issue date as printed on the invoice
    #[serde(rename = "开票日期", default = "not_available", deserialize_with = "lenient_string")]
    pub issue_date: String,
    /// Line item name
    #[serde(rename = "项目名称", default = "not_available", deserialize_with = "lenient_string")]
    pub item_name: String,
    /// Quantity
    #[serde(rename = "数量", default = "not_available", deserialize_with = "lenient_string")]
    pub quantity: String,
    /// Amount before tax
    #[serde(rename = "金额", default = "not_available", deserialize_with = "lenient_string")]
    pub amount: String,
    /// Tax rate
    #[serde(rename = "税率", default = "not_available", deserialize_with = "lenient_string")]
    pub tax_rate: String,
    /// Tax amount
    #[serde(rename = "税额", default = "not_available", deserialize_with = "lenient_string")]
    pub tax_amount: String,
    /// Total including tax
    #[serde(rename = "价税合计", default = "not_available", deserialize_with = "lenient_string")]
    pub total_amount: String,
    /// Invoice type
    #[serde(rename = "发票票种", default = "not_available", deserialize_with = "lenient_string")]
    pub invoice_type: String,
    /// Expense category
    #[serde(rename = "类别", default = "not_available", deserialize_with = "lenient_string")]
    pub category: String,
}

impl ExtractionRecord {
    /// Serialized field names in column order
    pub const FIELD_NAMES: [&'static str; 15] = [
        "发票代码",
        "发票号码",
        "销方识别号",
        "销方名称",
        "购方识别号",
        "购买方名称",
        "开票日期",
        "项目名称",
        "数量",
        "金额",
        "税率",
        "税额",
        "价税合计",
        "发票票种",
        "类别",
    ];

    /// The record standing in for an item that could not be extracted
    pub fn sentinel() -> Self {
        let na = || NOT_AVAILABLE.to_string();
        Self {
            invoice_code: na(),
            invoice_number: na(),
            seller_tax_id: na(),
            seller_name: na(),
            buyer_tax_id: na(),
            buyer_name: na(),
            issue_date: na(),
            item_name: na(),
            quantity: na(),
            amount: na(),
            tax_rate: na(),
            tax_amount: na(),
            total_amount: na(),
            invoice_type: na(),
            category: na(),
        }
    }

    /// Parse the JSON object returned in a completion
    ///
    /// Missing keys and `null` become [`NOT_AVAILABLE`]; numbers and booleans are
    /// kept as their textual form. Anything that is not a JSON object fails.
    pub fn from_json(content: &str) -> Result<Self, ExtractionError> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| ExtractionError::Parse {
                reason: e.to_string(),
            })?;
        if !value.is_object() {
            return Err(ExtractionError::Parse {
                reason: format!("expected a JSON object, got {}", json_kind(&value)),
            });
        }
        serde_json::from_value(value).map_err(|e| ExtractionError::Parse {
            reason: e.to_string(),
        })
    }

    /// Field values in column order
    pub fn values(&self) -> [&str; 15] {
        [
            &self.invoice_code,
            &self.invoice_number,
            &self.seller_tax_id,
            &self.seller_name,
            &self.buyer_tax_id,
            &self.buyer_name,
            &self.issue_date,
            &self.item_name,
            &self.quantity,
            &self.amount,
            &self.tax_rate,
            &self.tax_amount,
            &self.total_amount,
            &self.invoice_type,
            &self.category,
        ]
    }

    /// True when every field holds the "N/A" marker
    pub fn is_sentinel(&self) -> bool {
        self.values().iter().all(|v| *v == NOT_AVAILABLE)
    }
}

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(not_available()),
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string field, got {}",
            json_kind(&other)
        ))),
    }
}

/// Terminal state of one item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Record parsed from the service response
    Succeeded {
        /// Attempt (1-based) that produced the response
        attempt: u32,
    },
    /// Sentinel record produced
    Failed {
        /// Final error message
        reason: String,
    },
}

/// Result of running one item through the pipeline
#[derive(Clone, Debug)]
pub struct TaskOutcome {
    /// The processed item
    pub item: WorkItem,
    /// Extracted or sentinel record
    pub record: ExtractionRecord,
    /// How the task ended
    pub status: TaskStatus,
}

impl TaskOutcome {
    /// True if the record came from the service
    pub fn is_success(&self) -> bool {
        matches!(self.status, TaskStatus::Succeeded { .. })
    }
}

/// Event emitted during a batch run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Batch accepted and split into waves
    BatchStarted {
        /// Number of items
        total: usize,
        /// Number of waves
        waves: usize,
        /// Concurrency width (wave size)
        width: usize,
    },

    /// A wave of items is being launched
    WaveStarted {
        /// 1-based wave number
        wave: usize,
        /// Items in this wave
        size: usize,
    },

    /// A task entered the concurrency gate
    ItemStarted {
        /// Sequence index of the item
        index: usize,
        /// File name
        name: String,
    },

    /// A remote-call span failed
    AttemptFailed {
        /// Sequence index of the item
        index: usize,
        /// 1-based attempt number
        attempt: u32,
        /// Attempt budget
        max_attempts: u32,
        /// Error message
        error: String,
    },

    /// Record extracted
    ItemSucceeded {
        /// Sequence index of the item
        index: usize,
        /// File name
        name: String,
        /// Attempt that succeeded
        attempt: u32,
    },

    /// Sentinel record produced
    ItemFailed {
        /// Sequence index of the item
        index: usize,
        /// File name
        name: String,
        /// Final error message
        error: String,
    },

    /// Remote file could not be deleted
    CleanupFailed {
        /// Sequence index of the item
        index: usize,
        /// Remote file id
        file_id: String,
        /// Error message
        error: String,
    },

    /// Source document renamed after a successful extraction
    Renamed {
        /// Original path
        from: PathBuf,
        /// New path
        to: PathBuf,
    },

    /// Source document kept its name
    RenameSkipped {
        /// Original path
        path: PathBuf,
        /// Why the rename did not happen
        reason: String,
    },

    /// Processed counter advanced
    Progress {
        /// Items in a terminal state
        processed: usize,
        /// Items in the batch
        total: usize,
        /// `processed * 100 / total`
        percent: usize,
        /// When the counter advanced
        timestamp: DateTime<Utc>,
    },

    /// All waves finished
    BatchComplete {
        /// Number of items
        total: usize,
        /// Records extracted from responses
        succeeded: usize,
        /// Sentinel records
        failed: usize,
        /// Wall-clock duration in milliseconds
        elapsed_ms: u64,
    },
}
