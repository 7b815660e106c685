//! Batch orchestration: waves, aggregation and final ordering

use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, broadcast};
use tracing::{error, info};

use crate::config::{PipelineConfig, RetryConfig};
use crate::gate::ConcurrencyGate;
use crate::progress::ProgressReporter;
use crate::prompt::PromptBuilder;
use crate::rate_limiter::CallRateLimiter;
use crate::remote::ExtractionService;
use crate::rename::{NoOpRenamer, RenameHandler};
use crate::types::{Event, ExtractionRecord, TaskOutcome, TaskStatus, WorkItem};

use super::context::TaskContext;
use super::task::run_extraction_task;

/// Capacity of the event channel; slow subscribers miss the oldest events
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Result of a finished batch
#[derive(Clone, Debug)]
pub struct BatchReport {
    /// One record per item, sorted by invoice number
    pub records: Vec<ExtractionRecord>,
    /// One outcome per item, in input order
    pub outcomes: Vec<TaskOutcome>,
    /// Items whose record came from the service
    pub succeeded: usize,
    /// Items that ended with the sentinel record
    pub failed: usize,
    /// Wall-clock time of the whole batch
    pub elapsed: Duration,
}

impl BatchReport {
    /// Mean wall-clock time per item, zero for an empty batch
    pub fn average_per_item(&self) -> Duration {
        if self.outcomes.is_empty() {
            return Duration::ZERO;
        }
        self.elapsed.div_f64(self.outcomes.len() as f64)
    }
}

/// Runs a batch of items in fixed-size waves
///
/// Each wave holds at most `max_concurrent_tasks` items. All tasks of a wave run
/// concurrently and the next wave starts only once every task of the current wave
/// is terminal. Across the whole batch, remote-call spans are serialized by one
/// shared [`CallRateLimiter`].
///
/// # Examples
///
/// ```no_run
/// use invoice_batch::config::{ApiConfig, PipelineConfig};
/// use invoice_batch::pipeline::BatchOrchestrator;
/// use invoice_batch::remote::HttpExtractionClient;
/// use invoice_batch::types::WorkItem;
/// use std::sync::Arc;
///
/// # async fn example() -> invoice_batch::Result<()> {
/// let client = HttpExtractionClient::new(&ApiConfig::default(), "sk-...")?;
/// let orchestrator = BatchOrchestrator::new(Arc::new(client), &PipelineConfig::default());
///
/// let items = vec![WorkItem::new("invoices/a.pdf", 0)];
/// let report = orchestrator.run(items).await;
/// println!("{} succeeded, {} failed", report.succeeded, report.failed);
/// # Ok(())
/// # }
/// ```
pub struct BatchOrchestrator {
    service: Arc<dyn ExtractionService>,
    rate_limiter: CallRateLimiter,
    width: usize,
    retry: RetryConfig,
    renamer: Arc<dyn RenameHandler>,
    prompt: PromptBuilder,
    event_tx: broadcast::Sender<Event>,
}

impl BatchOrchestrator {
    /// Create an orchestrator with renaming disabled and the default prompt
    pub fn new(service: Arc<dyn ExtractionService>, config: &PipelineConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            service,
            rate_limiter: CallRateLimiter::new(config.rate_limit_delay),
            width: config.max_concurrent_tasks.max(1),
            retry: config.retry.clone(),
            renamer: Arc::new(NoOpRenamer),
            prompt: PromptBuilder::default(),
            event_tx,
        }
    }

    /// Use `renamer` for documents that were extracted successfully
    #[must_use]
    pub fn with_renamer(mut self, renamer: Arc<dyn RenameHandler>) -> Self {
        self.renamer = renamer;
        self
    }

    /// Use `prompt` to build completion requests
    #[must_use]
    pub fn with_prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    /// Subscribe to batch events
    ///
    /// Only events sent after subscribing are received.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Number of items per wave
    pub fn width(&self) -> usize {
        self.width
    }

    /// Split items into waves of at most [`width`](Self::width), keeping input order
    pub fn plan_waves(&self, items: Vec<WorkItem>) -> Vec<Vec<WorkItem>> {
        let mut waves = Vec::with_capacity(items.len().div_ceil(self.width));
        let mut items = items.into_iter().peekable();
        while items.peek().is_some() {
            waves.push(items.by_ref().take(self.width).collect());
        }
        waves
    }

    /// Run every item to a terminal state and return the ordered results
    ///
    /// Never fails: items that cannot be extracted contribute a sentinel record.
    pub async fn run(&self, items: Vec<WorkItem>) -> BatchReport {
        let started = Instant::now();
        let total = items.len();
        let progress = ProgressReporter::new(total, self.event_tx.clone());

        let ctx = Arc::new(TaskContext {
            service: self.service.clone(),
            rate_limiter: self.rate_limiter.clone(),
            gate: ConcurrencyGate::new(self.width),
            progress: progress.clone(),
            renamer: self.renamer.clone(),
            prompt: self.prompt.clone(),
            retry: self.retry.clone(),
        });

        // Keyed by sequence index so equal invoice numbers keep input order
        let records: Arc<Mutex<Vec<(usize, ExtractionRecord)>>> =
            Arc::new(Mutex::new(Vec::with_capacity(total)));
        let mut outcomes = Vec::with_capacity(total);

        let waves = self.plan_waves(items);
        let wave_count = waves.len();
        info!(total, waves = wave_count, width = self.width, "Starting batch");
        progress.emit(Event::BatchStarted {
            total,
            waves: wave_count,
            width: self.width,
        });

        for (wave_index, wave) in waves.into_iter().enumerate() {
            let wave_number = wave_index + 1;
            info!(
                wave = wave_number,
                of = wave_count,
                size = wave.len(),
                "Starting wave"
            );
            progress.emit(Event::WaveStarted {
                wave: wave_number,
                size: wave.len(),
            });

            let mut wave_items = Vec::with_capacity(wave.len());
            let mut handles = Vec::with_capacity(wave.len());
            for item in wave {
                let ctx = ctx.clone();
                let records = records.clone();
                wave_items.push(item.clone());
                handles.push(tokio::spawn(async move {
                    let index = item.sequence_index;
                    let outcome = run_extraction_task(&ctx, item).await;
                    records.lock().await.push((index, outcome.record.clone()));
                    outcome
                }));
            }

            // The wave ends only when every task in it is terminal
            let results = join_all(handles).await;
            for (item, result) in wave_items.into_iter().zip(results) {
                match result {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => {
                        // The task died before reaching a terminal state
                        error!(
                            index = item.sequence_index + 1,
                            item = %item.display_name(),
                            error = %e,
                            "Extraction task panicked"
                        );
                        let reason = format!("task panicked: {}", e);
                        progress.emit(Event::ItemFailed {
                            index: item.sequence_index,
                            name: item.display_name(),
                            error: reason.clone(),
                        });
                        progress.increment_processed();
                        records
                            .lock()
                            .await
                            .push((item.sequence_index, ExtractionRecord::sentinel()));
                        outcomes.push(TaskOutcome {
                            item,
                            record: ExtractionRecord::sentinel(),
                            status: TaskStatus::Failed { reason },
                        });
                    }
                }
            }
        }

        let records = sort_records(std::mem::take(&mut *records.lock().await));

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let failed = outcomes.len() - succeeded;
        let elapsed = started.elapsed();

        info!(
            total,
            succeeded,
            failed,
            elapsed_ms = elapsed.as_millis() as u64,
            "Batch complete"
        );
        progress.emit(Event::BatchComplete {
            total,
            succeeded,
            failed,
            elapsed_ms: elapsed.as_millis() as u64,
        });

        BatchReport {
            records,
            outcomes,
            succeeded,
            failed,
            elapsed,
        }
    }
}

/// Lexicographic sort on the invoice number, ties broken by input position
///
/// Sentinels sort as "N/A". The result does not depend on the order in which
/// tasks finished.
fn sort_records(mut records: Vec<(usize, ExtractionRecord)>) -> Vec<ExtractionRecord> {
    records.sort_by(|(ia, a), (ib, b)| {
        a.invoice_number
            .cmp(&b.invoice_number)
            .then_with(|| ia.cmp(ib))
    });
    records.into_iter().map(|(_, record)| record).collect()
}
