//! Pipeline worker CLI.
//!
//! `run` consumes the queue until interrupted; `sync` ingests a JSON file
//! of vendor meeting records for one city (standing in for the vendor
//! adapters, which live outside this crate); `sweep` rescues stale jobs;
//! `stats` prints queue counters.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use analysis::{Analyzer, AnalyzerConfig, GeminiSummarizer};
use pipeline_core::ingest::MeetingSync;
use pipeline_core::process::Processor;
use pipeline_core::{Config, Store};

#[derive(Parser)]
#[command(name = "worker", about = "Engagic pipeline worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Consume the processing queue until shutdown.
    Run {
        /// Bind this worker to a single city.
        #[arg(long)]
        banana: Option<String>,
    },
    /// Ingest a JSON file of vendor meeting records for a city.
    Sync {
        /// City slug, e.g. paloaltoCA.
        #[arg(long)]
        banana: String,
        /// Path to a JSON array of meeting records.
        #[arg(long)]
        file: PathBuf,
    },
    /// Reset stale processing jobs and meetings.
    Sweep,
    /// Print queue statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let store = Store::connect(&config).await?;

    match cli.command {
        Command::Run { banana } => run_worker(store, config, banana).await,
        Command::Sync { banana, file } => sync_city(store, config, &banana, &file).await,
        Command::Sweep => {
            let recovered = store.queue.recover_stale(config.stale_threshold_minutes).await?;
            let meetings = store
                .meetings
                .reset_stale_processing(config.stale_threshold_minutes)
                .await?;
            info!(jobs = recovered, meetings, "stale sweep complete");
            Ok(())
        }
        Command::Stats => {
            let stats = store.queue.stats().await?;
            println!(
                "pending: {}\nprocessing: {}\ncompleted: {}\nfailed: {}\ndead_letter: {}\navg_processing_seconds: {:.1}",
                stats.pending,
                stats.processing,
                stats.completed,
                stats.failed,
                stats.dead_letter,
                stats.avg_processing_seconds,
            );
            Ok(())
        }
    }
}

async fn run_worker(store: Store, config: Config, banana: Option<String>) -> Result<()> {
    let api_key = config.require_llm_api_key()?.to_string();
    let summarizer = Arc::new(GeminiSummarizer::new(&api_key));
    let analyzer = Arc::new(Analyzer::new(
        summarizer,
        AnalyzerConfig {
            llm_concurrency: config.llm_concurrency,
            http_recycle_after: config.http_recycle_after,
        },
    )?);

    let mut processor = Processor::new(store, analyzer, config);
    if let Some(banana) = banana {
        processor = processor.for_city(banana);
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("shutdown signal received");
            signal_token.cancel();
        }
    });

    processor.run(shutdown).await?;
    Ok(())
}

async fn sync_city(store: Store, config: Config, banana: &str, file: &PathBuf) -> Result<()> {
    let Some(city) = store.cities.get(banana).await? else {
        bail!("unknown city: {banana}");
    };

    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let records: Vec<serde_json::Value> =
        serde_json::from_str(&raw).context("parsing meeting records")?;

    let sync = MeetingSync::new(store, config.stale_threshold_minutes);
    let mut stored = 0usize;
    let mut skipped = 0usize;

    for record in records {
        let (meeting, stats) = sync.sync_meeting(record, &city).await?;
        if meeting.is_some() {
            stored += 1;
        } else {
            skipped += 1;
            if let Some(reason) = stats.skip_reason {
                warn!(
                    city = banana,
                    title = stats.skipped_title.as_deref().unwrap_or("Unknown"),
                    reason,
                    "meeting skipped"
                );
            }
        }
    }

    info!(city = banana, stored, skipped, "sync complete");
    Ok(())
}
