//! Configuration types for invoice-batch

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Remote service settings (endpoint, credentials, model)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the OpenAI-compatible API (default: "https://api.moonshot.cn/v1")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key given inline (takes precedence over env var and key file)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Environment variable consulted when no inline key is set (default: "MOONSHOT_API_KEY")
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// File holding the API key, read when neither inline key nor env var is set
    /// (default: "moonshot.txt")
    #[serde(default = "default_api_key_file")]
    pub api_key_file: PathBuf,

    /// Chat model used for extraction (default: "kimi-k2-0905-preview")
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout (default: 120 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Purpose field sent with every upload (default: "file-extract")
    #[serde(default = "default_upload_purpose")]
    pub upload_purpose: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
            api_key_file: default_api_key_file(),
            model: default_model(),
            request_timeout: default_request_timeout(),
            upload_purpose: default_upload_purpose(),
        }
    }
}

/// Retry configuration for transport failures
///
/// `max_attempts` counts every attempt including the first one. With a
/// `backoff_multiplier` of 1.0 and jitter disabled the delay between attempts is fixed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per item (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt (default: 2 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between attempts (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each failed attempt (default: 1.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Concurrency and pacing of the extraction pipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of tasks active at once, also the wave size (default: 5)
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Idle time enforced between the end of one remote-call span and the start of
    /// the next (default: 500 milliseconds)
    #[serde(default = "default_rate_limit_delay", with = "duration_ms_serde")]
    pub rate_limit_delay: Duration,

    /// Per-item retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            rate_limit_delay: default_rate_limit_delay(),
            retry: RetryConfig::default(),
        }
    }
}

/// Local inputs and outputs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IoConfig {
    /// Directory scanned for documents (default: "./invoices")
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// CSV report destination (default: "invoices_data.csv")
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Optional file naming the expected buyer, appended to the prompt (default: "buyer.txt")
    #[serde(default = "default_buyer_file")]
    pub buyer_file: Option<PathBuf>,

    /// Extension of documents to process, matched case-insensitively (default: "pdf")
    #[serde(default = "default_document_extension")]
    pub document_extension: String,

    /// Rename each successfully extracted document after its invoice data (default: true)
    #[serde(default = "default_true")]
    pub rename_on_success: bool,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_path: default_output_path(),
            buyer_file: default_buyer_file(),
            document_extension: default_document_extension(),
            rename_on_success: true,
        }
    }
}

/// Main configuration
///
/// `pipeline` and `io` are flattened, so a TOML file keeps those keys at the top
/// level and only the `[api]` table is nested.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote service settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Concurrency, pacing and retry
    #[serde(flatten)]
    pub pipeline: PipelineConfig,

    /// Input directory, report path, renaming
    #[serde(flatten)]
    pub io: IoConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config {
            message: format!("invalid TOML: {e}"),
            key: None,
        })
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_concurrent_tasks == 0 {
            return Err(Error::config(
                "must be at least 1",
                "max_concurrent_tasks",
            ));
        }
        if self.pipeline.retry.max_attempts == 0 {
            return Err(Error::config("must be at least 1", "retry.max_attempts"));
        }
        let multiplier = self.pipeline.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(Error::config(
                "must be a finite number, 1.0 or greater",
                "retry.backoff_multiplier",
            ));
        }
        url::Url::parse(&self.api.base_url)
            .map_err(|e| Error::config(format!("invalid URL: {e}"), "api.base_url"))?;
        if self.api.model.trim().is_empty() {
            return Err(Error::config("must not be empty", "api.model"));
        }
        Ok(())
    }

    /// Resolve the API key: inline value, then environment variable, then key file
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api.api_key.as_deref().map(str::trim)
            && !key.is_empty()
        {
            return Ok(key.to_string());
        }

        if let Ok(key) = std::env::var(&self.api.api_key_env) {
            let key = key.trim();
            if !key.is_empty() {
                return Ok(key.to_string());
            }
        }

        let path = &self.api.api_key_file;
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::config(
                    format!(
                        "no API key found: set {} or create '{}' containing the key",
                        self.api.api_key_env,
                        path.display()
                    ),
                    "api.api_key_file",
                ));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let key = contents.trim();
        if key.is_empty() {
            return Err(Error::config(
                format!("API key file '{}' is empty", path.display()),
                "api.api_key_file",
            ));
        }
        Ok(key.to_string())
    }

    /// Read the optional buyer file into a prompt paragraph
    ///
    /// Returns `Ok(None)` when no buyer file is configured or it does not exist.
    pub fn buyer_hint(&self) -> Result<Option<String>> {
        let Some(path) = &self.io.buyer_file else {
            return Ok(None);
        };
        match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(format!(
                "Buyer name and tax id:\n{}",
                text.trim_end()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

fn default_base_url() -> String {
    "https://api.moonshot.cn/v1".to_string()
}

fn default_api_key_env() -> String {
    "MOONSHOT_API_KEY".to_string()
}

fn default_api_key_file() -> PathBuf {
    PathBuf::from("moonshot.txt")
}

fn default_model() -> String {
    "kimi-k2-0905-preview".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_upload_purpose() -> String {
    "file-extract".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_concurrent_tasks() -> usize {
    5
}

fn default_rate_limit_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("invoices")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("invoices_data.csv")
}

fn default_buyer_file() -> Option<PathBuf> {
    Some(PathBuf::from("buyer.txt"))
}

fn default_document_extension() -> String {
    "pdf".to_string()
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
