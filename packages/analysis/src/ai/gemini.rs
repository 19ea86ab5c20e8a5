//! Gemini implementation of the summarizer, via rig.
//!
//! Rate limiting is reactive: there is no token bucket here. When the
//! provider pushes back we sleep and retry inside a fixed budget, and the
//! caller's own timeout (5 minutes per call in the processor) is the outer
//! bound.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rig::completion::Prompt;
use rig::providers::gemini;
use tracing::{debug, warn};

use crate::error::{AnalysisError, Result};
use crate::prompts;
use crate::traits::{ItemSummary, Summarizer};

const MODEL: &str = "gemini-2.0-flash";

/// Retry budget for rate-limited calls. Kept under the processor's 5-minute
/// per-call timeout so a retried call still has time to complete.
const RETRY_BUDGET: Duration = Duration::from_secs(180);

/// Base delay between rate-limit retries; doubles each attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(10);

/// Gemini-backed summarizer.
pub struct GeminiSummarizer {
    client: gemini::Client,
    model: String,
}

impl GeminiSummarizer {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: gemini::Client::new(api_key),
            model: MODEL.to_string(),
        }
    }

    /// Use a different Gemini model (e.g. a pro tier for long packets).
    pub fn with_model(api_key: &str, model: impl Into<String>) -> Self {
        Self {
            client: gemini::Client::new(api_key),
            model: model.into(),
        }
    }

    /// One completion with reactive backoff on rate limits.
    async fn complete(&self, prompt: &str) -> Result<String> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(prompts::PREAMBLE)
            .max_tokens(8192)
            .build();

        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            match agent.prompt(prompt).await {
                Ok(response) => {
                    debug!(chars = response.len(), attempt, "gemini completion");
                    return Ok(response);
                }
                Err(e) => {
                    let classified = classify_error(&e.to_string());
                    match classified {
                        AnalysisError::RateLimited(_) => {
                            let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt);
                            if started.elapsed() + delay > RETRY_BUDGET {
                                warn!(attempt, "rate-limit retry budget exhausted");
                                return Err(classified);
                            }
                            warn!(attempt, delay_secs = delay.as_secs(), "rate limited, backing off");
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        other => return Err(other),
                    }
                }
            }
        }
    }
}

/// Map a provider error message onto the analysis taxonomy.
///
/// rig surfaces provider failures as strings; rate limits are recognized by
/// the markers Gemini actually uses.
fn classify_error(message: &str) -> AnalysisError {
    let lower = message.to_lowercase();
    if lower.contains("429")
        || lower.contains("resource_exhausted")
        || lower.contains("rate limit")
        || lower.contains("quota")
    {
        AnalysisError::RateLimited(message.to_string())
    } else {
        AnalysisError::Llm(message.to_string())
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize_meeting(&self, text: &str) -> Result<String> {
        let response = self.complete(&prompts::meeting_prompt(text)).await?;
        if response.trim().is_empty() {
            return Err(AnalysisError::Llm("empty meeting summary".into()));
        }
        Ok(response)
    }

    async fn summarize_item(
        &self,
        title: &str,
        text: &str,
        shared_context: Option<&str>,
        page_count: Option<u32>,
    ) -> Result<ItemSummary> {
        let prompt = prompts::item_prompt(title, text, shared_context, page_count);
        let response = self.complete(&prompt).await?;

        let (summary, topics) = prompts::parse_item_response(&response);
        if summary.is_empty() {
            return Err(AnalysisError::Llm("empty item summary".into()));
        }

        Ok(ItemSummary { summary, topics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_messages_classify_as_rate_limited() {
        assert!(matches!(
            classify_error("HTTP 429 Too Many Requests"),
            AnalysisError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error("RESOURCE_EXHAUSTED: quota exceeded"),
            AnalysisError::RateLimited(_)
        ));
    }

    #[test]
    fn other_messages_classify_as_permanent() {
        assert!(matches!(
            classify_error("invalid request: prompt too long"),
            AnalysisError::Llm(_)
        ));
    }
}
