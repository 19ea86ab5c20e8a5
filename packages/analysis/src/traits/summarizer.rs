//! Summarizer trait for LLM operations.
//!
//! Implementations wrap a specific model provider and handle prompting and
//! response parsing. The contract the pipeline relies on:
//!
//! - long inputs are accepted (agenda packets run to hundreds of pages)
//! - rate limits surface as [`AnalysisError::RateLimited`] so the caller's
//!   timeout budget can distinguish them from permanent failures
//! - item summaries come back with topic tags from a controllable vocabulary
//!
//! [`AnalysisError::RateLimited`]: crate::error::AnalysisError::RateLimited

use async_trait::async_trait;

use crate::error::Result;

/// A per-item summary plus the topic tags the model assigned.
#[derive(Debug, Clone)]
pub struct ItemSummary {
    pub summary: String,
    pub topics: Vec<String>,
}

/// LLM summarization seam.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize an entire meeting packet into one structured summary.
    ///
    /// The result contains a discoverable "Summary" section; formatting
    /// beyond that is up to the implementation.
    async fn summarize_meeting(&self, text: &str) -> Result<String>;

    /// Summarize a single agenda item.
    ///
    /// `shared_context` carries meeting-level documents referenced by more
    /// than one item; it is passed once and the item text stays specific.
    /// `page_count` lets the implementation scale summary length to the
    /// source material.
    async fn summarize_item(
        &self,
        title: &str,
        text: &str,
        shared_context: Option<&str>,
        page_count: Option<u32>,
    ) -> Result<ItemSummary>;
}
