//! Utility functions for locating input documents

use crate::error::{Error, Result};
use crate::types::WorkItem;
use std::path::{Path, PathBuf};

/// List the documents in `dir` with the given extension
///
/// Only regular files directly inside `dir` are considered. The extension match
/// ignores case and a leading dot. Results are sorted by file name so sequence
/// indices are stable between runs.
///
/// # Errors
///
/// Returns [`Error::Config`] for `input_dir` if `dir` does not exist or is not a
/// directory, and [`Error::Io`] if it cannot be read.
///
/// # Examples
///
/// ```no_run
/// use invoice_batch::utils::discover_documents;
/// use std::path::Path;
///
/// # async fn example() -> invoice_batch::Result<()> {
/// let documents = discover_documents(Path::new("./invoices"), "pdf").await?;
/// println!("found {} invoices", documents.len());
/// # Ok(())
/// # }
/// ```
pub async fn discover_documents(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let is_dir = tokio::fs::metadata(dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(Error::config(
            format!("input directory {} does not exist", dir.display()),
            "input_dir",
        ));
    }

    let wanted = extension.trim_start_matches('.');
    let mut documents = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        if has_extension(&path, wanted) {
            documents.push(path);
        }
    }

    documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(documents)
}

/// Wrap discovered paths as work items numbered in order
pub fn work_items(paths: Vec<PathBuf>) -> Vec<WorkItem> {
    paths
        .into_iter()
        .enumerate()
        .map(|(index, path)| WorkItem::new(path, index))
        .collect()
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
}
