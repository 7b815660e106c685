//! Renaming of source documents after a successful extraction
//!
//! Successfully extracted documents are renamed to
//! `{invoice_number}-{issue_date}-{category}-{total}.{ext}` next to the original,
//! where `total` is the truncated integer part of the total amount. Renames never
//! overwrite an existing file.

use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::ExtractionRecord;

/// Characters that may not appear in a generated file name
const FORBIDDEN_CHARS: &str = r#"[\\/*?:"<>|]"#;

/// What happened to a source document after extraction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenameOutcome {
    /// Document moved to the contained path
    Renamed(PathBuf),
    /// The contained target already existed; the document kept its name
    TargetExists(PathBuf),
    /// Renaming is disabled or not applicable
    Skipped,
}

/// Post-success hook for source documents
#[async_trait]
pub trait RenameHandler: Send + Sync {
    /// Rename `path` based on the record extracted from it
    async fn rename(&self, path: &Path, record: &ExtractionRecord) -> Result<RenameOutcome>;
}

/// Renamer used when renaming is disabled
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpRenamer;

#[async_trait]
impl RenameHandler for NoOpRenamer {
    async fn rename(&self, _path: &Path, _record: &ExtractionRecord) -> Result<RenameOutcome> {
        Ok(RenameOutcome::Skipped)
    }
}

/// Renames documents on disk, one at a time
///
/// The existence check and the move happen under one lock, so two tasks producing
/// the same target name cannot both succeed.
#[derive(Debug)]
pub struct FileRenamer {
    forbidden: Regex,
    lock: Mutex<()>,
}

impl FileRenamer {
    /// Create a renamer
    ///
    /// # Errors
    /// Returns error if the file name filter cannot be compiled
    pub fn new() -> Result<Self> {
        let forbidden = Regex::new(FORBIDDEN_CHARS)
            .map_err(|e| Error::Other(format!("invalid file name filter: {}", e)))?;
        Ok(Self {
            forbidden,
            lock: Mutex::new(()),
        })
    }

    /// Remove characters that are not allowed in file names
    pub fn sanitize(&self, name: &str) -> String {
        self.forbidden.replace_all(name, "").into_owned()
    }

    /// Sanitized target file name for a record and extension
    pub fn target_name(&self, record: &ExtractionRecord, extension: &str) -> String {
        self.sanitize(&format!(
            "{}-{}-{}-{}.{}",
            record.invoice_number,
            record.issue_date,
            record.category,
            truncated_total(&record.total_amount),
            extension
        ))
    }
}

#[async_trait]
impl RenameHandler for FileRenamer {
    async fn rename(&self, path: &Path, record: &ExtractionRecord) -> Result<RenameOutcome> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target_name = self.target_name(record, &extension);
        let target = path
            .parent()
            .map(|dir| dir.join(&target_name))
            .unwrap_or_else(|| PathBuf::from(&target_name));

        let _guard = self.lock.lock().await;

        if target == path {
            return Ok(RenameOutcome::Skipped);
        }
        if tokio::fs::try_exists(&target).await? {
            warn!(target = %target.display(), "rename target already exists, keeping original name");
            return Ok(RenameOutcome::TargetExists(target));
        }

        tokio::fs::rename(path, &target).await?;
        info!(from = %path.display(), to = %target_name, "renamed document");
        Ok(RenameOutcome::Renamed(target))
    }
}

/// Integer part of a total amount, 0 when it does not parse
fn truncated_total(total: &str) -> i64 {
    total
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.trunc() as i64)
        .unwrap_or(0)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(number: &str, date: &str, category: &str, total: &str) -> ExtractionRecord {
        ExtractionRecord {
            invoice_number: number.to_string(),
            issue_date: date.to_string(),
            category: category.to_string(),
            total_amount: total.to_string(),
            ..ExtractionRecord::sentinel()
        }
    }

    #[test]
    fn truncates_total_amount() {
        assert_eq!(truncated_total("187.92"), 187);
        assert_eq!(truncated_total(" 111 "), 111);
        assert_eq!(truncated_total("¥12.5"), 0);
        assert_eq!(truncated_total("N/A"), 0);
    }

    #[test]
    fn target_name_strips_forbidden_characters() {
        let renamer = FileRenamer::new().unwrap();
        let name = renamer.target_name(&record("45/31:11", "2024-12-30", "餐饮*服务?", "187.92"), "pdf");
        assert_eq!(name, "453111-2024-12-30-餐饮服务-187.pdf");
        assert_eq!(renamer.sanitize(r#"a\b/c*d?e:f"g<h>i|j"#), "abcdefghij");
    }

    #[tokio::test]
    async fn renames_next_to_original() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("scan-001.pdf");
        std::fs::write(&source, b"pdf").unwrap();

        let renamer = FileRenamer::new().unwrap();
        let outcome = renamer
            .rename(&source, &record("45311111", "2024年12月30日", "餐饮服务", "187.92"))
            .await
            .unwrap();

        let expected = dir.path().join("45311111-2024年12月30日-餐饮服务-187.pdf");
        assert_eq!(outcome, RenameOutcome::Renamed(expected.clone()));
        assert!(expected.exists());
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn existing_target_is_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("scan.pdf");
        let existing = dir.path().join("1-d-c-5.pdf");
        std::fs::write(&source, b"new").unwrap();
        std::fs::write(&existing, b"old").unwrap();

        let renamer = FileRenamer::new().unwrap();
        let outcome = renamer.rename(&source, &record("1", "d", "c", "5.9")).await.unwrap();

        assert_eq!(outcome, RenameOutcome::TargetExists(existing.clone()));
        assert_eq!(std::fs::read(&existing).unwrap(), b"old");
        assert!(source.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_renames_to_same_target_succeed_once() {
        let dir = TempDir::new().unwrap();
        let renamer = Arc::new(FileRenamer::new().unwrap());

        let mut handles = Vec::new();
        for i in 0..6 {
            let source = dir.path().join(format!("dup-{i}.pdf"));
            std::fs::write(&source, format!("{i}")).unwrap();
            let renamer = renamer.clone();
            handles.push(tokio::spawn(async move {
                renamer
                    .rename(&source, &record("7", "d", "c", "1"))
                    .await
                    .unwrap()
            }));
        }

        let mut renamed = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), RenameOutcome::Renamed(_)) {
                renamed += 1;
            }
        }
        assert_eq!(renamed, 1);
    }

    #[tokio::test]
    async fn noop_renamer_leaves_file_alone() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("keep.pdf");
        std::fs::write(&source, b"pdf").unwrap();

        let outcome = NoOpRenamer
            .rename(&source, &record("1", "d", "c", "1"))
            .await
            .unwrap();
        assert_eq!(outcome, RenameOutcome::Skipped);
        assert!(source.exists());
    }
}
