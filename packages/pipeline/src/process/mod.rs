//! The processor: queue consumer that turns pending jobs into summaries.
//!
//! Loop: dequeue → dispatch by job type → mark complete/failed. Polls
//! every few seconds when the queue is empty, sweeps stale jobs on an
//! interval, and shuts down cooperatively — an in-flight job either
//! finishes or the staleness sweep rescues it later.

pub mod documents;
pub mod matter;
pub mod meeting;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use analysis::{Analyzer, TopicNormalizer};

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::ingest::MatterEnqueueDecider;
use crate::jobs::{JobPayload, QueueJobRow};
use crate::store::Store;

/// Backoff after an unexpected dequeue/transport failure, so a broken
/// database connection doesn't spin the loop.
const FATAL_ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// How often the stale-job sweep runs.
const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Per-city processing counters.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunStats {
    pub processed: usize,
    pub failed: usize,
    pub items_processed: usize,
    pub items_new: usize,
    pub items_skipped: usize,
    pub items_failed: usize,
}

/// Long-running queue worker.
pub struct Processor {
    store: Store,
    analyzer: Arc<Analyzer>,
    normalizer: TopicNormalizer,
    matter_decider: MatterEnqueueDecider,
    config: Config,
    /// Bind the worker to one city so cities don't block each other.
    banana: Option<String>,
}

impl Processor {
    pub fn new(store: Store, analyzer: Arc<Analyzer>, config: Config) -> Self {
        Self {
            store,
            analyzer,
            normalizer: TopicNormalizer::new(),
            matter_decider: MatterEnqueueDecider::new(),
            config,
            banana: None,
        }
    }

    /// Shard this worker to a single city.
    pub fn for_city(mut self, banana: impl Into<String>) -> Self {
        self.banana = Some(banana.into());
        self
    }

    /// Process jobs until the shutdown token fires.
    ///
    /// The dequeue itself is never raced against the shutdown signal: a
    /// cancelled in-flight claim would leave the row in `processing` until
    /// the stale sweep found it. Shutdown is checked between jobs instead.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!(banana = self.banana.as_deref().unwrap_or("all"), "queue processor starting");

        let mut last_sweep = tokio::time::Instant::now();

        while !shutdown.is_cancelled() {
            if last_sweep.elapsed() >= STALE_SWEEP_INTERVAL {
                if let Err(e) = self.sweep_stale().await {
                    error!(error = %e, "stale sweep failed");
                }
                last_sweep = tokio::time::Instant::now();
            }

            match self.store.queue.next_for_processing(self.banana.as_deref()).await {
                Ok(Some(job)) => self.handle_job(job).await,
                Ok(None) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.queue_poll_interval) => {}
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to dequeue");
                    tokio::time::sleep(FATAL_ERROR_BACKOFF).await;
                }
            }
        }

        info!("queue processor stopped");
        Ok(())
    }

    /// Drain every pending job for one city, then return counters.
    pub async fn process_city_jobs(&self, banana: &str) -> Result<ProcessRunStats> {
        info!(city = banana, "processing queued jobs for city");
        let mut stats = ProcessRunStats::default();

        while let Some(job) = self.store.queue.next_for_processing(Some(banana)).await? {
            let queue_id = job.id;
            match self.dispatch(&job).await {
                Ok(job_stats) => {
                    self.store.queue.mark_complete(queue_id).await?;
                    stats.processed += 1;
                    stats.items_processed += job_stats.items_processed;
                    stats.items_new += job_stats.items_new;
                    stats.items_skipped += job_stats.items_skipped;
                    stats.items_failed += job_stats.items_failed;
                }
                Err(e) => {
                    self.store
                        .queue
                        .mark_failed(queue_id, &e.to_string(), e.is_retryable(), self.config.retry_cap)
                        .await?;
                    stats.failed += 1;
                }
            }
        }

        info!(
            city = banana,
            processed = stats.processed,
            failed = stats.failed,
            items = stats.items_processed,
            "processing complete for city"
        );
        Ok(stats)
    }

    /// Run the stale sweep once (also exposed via the CLI).
    pub async fn sweep_stale(&self) -> Result<u64> {
        let threshold = self.config.stale_threshold_minutes;
        let jobs = self.store.queue.recover_stale(threshold).await?;
        let meetings = self.store.meetings.reset_stale_processing(threshold).await?;
        if jobs > 0 || meetings > 0 {
            info!(jobs, meetings, "stale sweep recovered work");
        }
        Ok(jobs)
    }

    async fn handle_job(&self, job: QueueJobRow) {
        let queue_id = job.id;
        info!(queue_id, job_type = %job.job_type, "processing queue job");

        match self.dispatch(&job).await {
            Ok(_) => {
                if let Err(e) = self.store.queue.mark_complete(queue_id).await {
                    error!(queue_id, error = %e, "failed to mark job complete");
                } else {
                    info!(queue_id, "queue job completed");
                }
            }
            Err(e) => {
                warn!(queue_id, error = %e, retryable = e.is_retryable(), "queue job failed");
                if let Err(mark_err) = self
                    .store
                    .queue
                    .mark_failed(queue_id, &e.to_string(), e.is_retryable(), self.config.retry_cap)
                    .await
                {
                    error!(queue_id, error = %mark_err, "failed to mark job failed");
                }
            }
        }
    }

    /// Route one job by payload type.
    async fn dispatch(&self, job: &QueueJobRow) -> Result<ProcessRunStats> {
        let payload = job.decode_payload()?;

        match payload {
            JobPayload::Meeting(meeting_job) => {
                let meeting = self
                    .store
                    .meetings
                    .get(&meeting_job.meeting_id)
                    .await?
                    .ok_or_else(|| PipelineError::MissingMeeting(meeting_job.meeting_id.clone()))?;
                self.process_meeting(&meeting).await
            }
            JobPayload::Matter(matter_job) => {
                self.process_matter(&matter_job).await?;
                Ok(ProcessRunStats {
                    processed: 1,
                    ..Default::default()
                })
            }
        }
    }
}
