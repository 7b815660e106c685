//! Document fixtures and test configuration

use invoice_batch::{ApiConfig, Config, IoConfig, PipelineConfig, RetryConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Bytes written into every fake document
pub const FAKE_PDF: &[u8] = b"%PDF-1.4\n% fake invoice for tests\n%%EOF\n";

/// Create `{stem}.pdf` for each stem inside `dir`
pub fn write_documents(dir: &Path, stems: &[&str]) -> Vec<PathBuf> {
    stems
        .iter()
        .map(|stem| {
            let path = dir.join(format!("{stem}.pdf"));
            std::fs::write(&path, FAKE_PDF).unwrap();
            path
        })
        .collect()
}

/// Workspace for one batch run: an input directory and a report path
pub struct TestWorkspace {
    pub root: TempDir,
    pub input_dir: PathBuf,
    pub output_path: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let input_dir = root.path().join("invoices");
        std::fs::create_dir(&input_dir).unwrap();
        let output_path = root.path().join("invoices_data.csv");
        Self {
            root,
            input_dir,
            output_path,
        }
    }

    /// Configuration pointing at `base_url` with short delays and an inline key
    pub fn config(&self, base_url: &str) -> Config {
        Config {
            api: ApiConfig {
                base_url: format!("{base_url}/v1"),
                api_key: Some("sk-test".to_string()),
                request_timeout: Duration::from_secs(5),
                ..ApiConfig::default()
            },
            pipeline: PipelineConfig {
                max_concurrent_tasks: 2,
                rate_limit_delay: Duration::from_millis(1),
                retry: RetryConfig {
                    max_attempts: 3,
                    initial_delay: Duration::from_millis(10),
                    ..RetryConfig::default()
                },
            },
            io: IoConfig {
                input_dir: self.input_dir.clone(),
                output_path: self.output_path.clone(),
                buyer_file: None,
                ..IoConfig::default()
            },
        }
    }

    /// Data rows of the written report, BOM and header stripped
    pub fn report_rows(&self) -> Vec<Vec<String>> {
        let bytes = std::fs::read(&self.output_path).unwrap();
        let body = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap();
        let mut reader = csv::Reader::from_reader(body);
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    /// File names currently in the input directory, sorted
    pub fn input_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.input_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
