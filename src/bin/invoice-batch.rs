//! Command-line entry point
//!
//! Run with: cargo run --bin invoice-batch -- --input-dir ./invoices

use anyhow::Context;
use clap::Parser;
use invoice_batch::{Config, run_batch};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Configuration file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "invoice-batch.toml";

/// Extract invoice data from a directory of documents into a CSV report
#[derive(Debug, Parser)]
#[command(name = "invoice-batch", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing the documents to process
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// CSV report path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of documents processed concurrently
    #[arg(long)]
    concurrency: Option<usize>,

    /// Completion model
    #[arg(long)]
    model: Option<String>,

    /// Base URL of the extraction API
    #[arg(long)]
    base_url: Option<String>,

    /// Keep original file names after extraction
    #[arg(long)]
    no_rename: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Config::from_toml_file(&default_path)
                        .with_context(|| format!("failed to load {}", default_path.display()))?
                } else {
                    Config::default()
                }
            }
        };

        if let Some(dir) = &self.input_dir {
            config.io.input_dir = dir.clone();
        }
        if let Some(output) = &self.output {
            config.io.output_path = output.clone();
        }
        if let Some(width) = self.concurrency {
            config.pipeline.max_concurrent_tasks = width;
        }
        if let Some(model) = &self.model {
            config.api.model = model.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.api.base_url = base_url.clone();
        }
        if self.no_rename {
            config.io.rename_on_success = false;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "invoice_batch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Input directory: {}", config.io.input_dir.display());
    tracing::info!("  - Output: {}", config.io.output_path.display());
    tracing::info!("  - Model: {}", config.api.model);
    tracing::info!(
        "  - Concurrency: {}",
        config.pipeline.max_concurrent_tasks
    );

    let report = run_batch(&config).await.context("batch failed")?;

    if report.outcomes.is_empty() {
        println!("No documents found in {}", config.io.input_dir.display());
        return Ok(());
    }

    println!();
    println!("Processed {} documents", report.outcomes.len());
    println!("  Succeeded: {}", report.succeeded);
    println!("  Failed:    {}", report.failed);
    println!("  Total time: {}", format_duration(report.elapsed));
    println!(
        "  Average per document: {}",
        format_duration(report.average_per_item())
    );
    println!("Report written to {}", config.io.output_path.display());

    Ok(())
}

fn format_duration(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}
