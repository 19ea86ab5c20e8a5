//! Environment-backed configuration.
//!
//! Everything has a default except the database URL; the LLM key is only
//! required when a processor actually runs.

use std::env;
use std::time::Duration;

use crate::error::{PipelineError, Result};

/// Pipeline settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres DSN.
    pub database_url: String,
    /// Connection pool bounds.
    pub db_pool_min: u32,
    pub db_pool_max: u32,
    /// Gemini API key; absent means summarization is unavailable.
    pub llm_api_key: Option<String>,
    /// Concurrent LLM calls per processor.
    pub llm_concurrency: usize,
    /// Minutes before a `processing` job is considered orphaned.
    pub stale_threshold_minutes: i64,
    /// Failed attempts before a job dead-letters.
    pub retry_cap: i32,
    /// HTTP requests before the analyzer's client is rebuilt.
    pub http_recycle_after: u32,
    /// Sleep between polls when the queue is empty.
    pub queue_poll_interval: Duration,
}

impl Config {
    /// Read configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| PipelineError::Config("DATABASE_URL is not set".into()))?;

        Ok(Self {
            database_url,
            db_pool_min: parse_env("DB_POOL_MIN", 10)?,
            db_pool_max: parse_env("DB_POOL_MAX", 100)?,
            llm_api_key: env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            llm_concurrency: parse_env("LLM_CONCURRENCY", 3)?,
            stale_threshold_minutes: parse_env("STALE_THRESHOLD_MINUTES", 60)?,
            retry_cap: parse_env("RETRY_CAP", 3)?,
            http_recycle_after: parse_env("HTTP_RECYCLE_AFTER", 100)?,
            queue_poll_interval: Duration::from_secs(parse_env("QUEUE_POLL_SECS", 5)?),
        })
    }

    /// The API key, or a configuration error for paths that need the LLM.
    pub fn require_llm_api_key(&self) -> Result<&str> {
        self.llm_api_key
            .as_deref()
            .ok_or_else(|| PipelineError::Config("LLM_API_KEY is not set".into()))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| PipelineError::Config(format!("invalid value for {name}: {raw}"))),
        Err(_) => Ok(default),
    }
}
