//! Analysis orchestration: fetch → extract → summarize.
//!
//! The analyzer owns the HTTP fetcher, the PDF extractor, and a summarizer
//! implementation. Item batches run with bounded concurrency — the only
//! proactive throttle — and results stream back as they complete so the
//! caller can persist incrementally. Rate limiting beyond that is reactive
//! and lives inside the summarizer.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::{error, info};

use crate::error::{AnalysisError, Result};
use crate::extract::{Extraction, PdfExtractor};
use crate::fetch::DocumentFetcher;
use crate::participation::{parse_participation_info, ParticipationInfo};
use crate::traits::{ItemSummary, Summarizer};

/// Per-call budget for LLM summarization. The summarizer's own retry budget
/// is shorter, so a rate-limited call still finishes inside this window.
pub const LLM_TIMEOUT: Duration = Duration::from_secs(300);

/// Participation info is parsed from the head of the agenda only.
const PARTICIPATION_SCAN_CHARS: usize = 5_000;

/// Processing method stamped on monolithic summaries.
pub const MONOLITHIC_METHOD: &str = "pdf_gemini";

/// Analyzer settings.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Concurrent LLM calls per batch.
    pub llm_concurrency: usize,
    /// Requests before the HTTP client is rebuilt.
    pub http_recycle_after: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            llm_concurrency: 3,
            http_recycle_after: 100,
        }
    }
}

/// One agenda item ready for summarization.
#[derive(Debug, Clone)]
pub struct ItemRequest {
    pub item_id: String,
    pub title: String,
    pub text: String,
    pub page_count: Option<u32>,
}

/// Outcome of summarizing one item.
#[derive(Debug)]
pub struct ItemResult {
    pub item_id: String,
    pub outcome: Result<ItemSummary>,
}

/// Result of monolithic packet processing.
#[derive(Debug)]
pub struct PacketResult {
    pub summary: String,
    pub participation: Option<ParticipationInfo>,
    pub processing_method: &'static str,
}

/// Orchestrates document analysis for the processor.
pub struct Analyzer {
    fetcher: DocumentFetcher,
    extractor: PdfExtractor,
    summarizer: Arc<dyn Summarizer>,
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(summarizer: Arc<dyn Summarizer>, config: AnalyzerConfig) -> Result<Self> {
        Ok(Self {
            fetcher: DocumentFetcher::new(config.http_recycle_after)?,
            extractor: PdfExtractor::new(),
            summarizer,
            config,
        })
    }

    pub fn fetcher(&self) -> &DocumentFetcher {
        &self.fetcher
    }

    /// Download a document and extract its text.
    pub async fn extract_document(&self, url: &str) -> Result<Extraction> {
        let bytes = self.fetcher.fetch(url).await?;
        self.extractor.extract(bytes).await
    }

    /// Parse participation info out of a document's opening pages.
    pub async fn extract_participation(&self, url: &str) -> Result<Option<ParticipationInfo>> {
        let extraction = self.extract_document(url).await?;
        let head: String = extraction
            .text
            .chars()
            .take(PARTICIPATION_SCAN_CHARS)
            .collect();
        Ok(parse_participation_info(&head))
    }

    /// Monolithic path: one summary for an entire packet PDF.
    pub async fn process_packet(&self, packet_url: &str) -> Result<PacketResult> {
        let extraction = self.extract_document(packet_url).await?;

        // Parsed before summarization so a failed LLM call doesn't cost us
        // the contact info.
        let head: String = extraction
            .text
            .chars()
            .take(PARTICIPATION_SCAN_CHARS)
            .collect();
        let participation = parse_participation_info(&head);

        let summary = tokio::time::timeout(
            LLM_TIMEOUT,
            self.summarizer.summarize_meeting(&extraction.text),
        )
        .await
        .map_err(|_| {
            error!(url = packet_url, "meeting summarization timed out");
            AnalysisError::LlmTimeout(LLM_TIMEOUT)
        })??;

        info!(url = packet_url, pages = extraction.page_count, "packet processed");

        Ok(PacketResult {
            summary,
            participation,
            processing_method: MONOLITHIC_METHOD,
        })
    }

    /// Summarize a batch of items with bounded concurrency.
    ///
    /// Results stream back in completion order; the shared context is sent
    /// with every call but item text stays item-specific.
    pub fn summarize_items(
        &self,
        requests: Vec<ItemRequest>,
        shared_context: Option<String>,
    ) -> BoxStream<'_, ItemResult> {
        let shared: Option<Arc<str>> = shared_context.map(Arc::from);
        let total = requests.len();
        info!(count = total, concurrency = self.config.llm_concurrency, "submitting item batch");

        stream::iter(requests)
            .map(move |request| {
                let shared = shared.clone();
                async move {
                    let outcome = tokio::time::timeout(
                        LLM_TIMEOUT,
                        self.summarizer.summarize_item(
                            &request.title,
                            &request.text,
                            shared.as_deref(),
                            request.page_count,
                        ),
                    )
                    .await
                    .unwrap_or(Err(AnalysisError::LlmTimeout(LLM_TIMEOUT)));

                    ItemResult {
                        item_id: request.item_id,
                        outcome,
                    }
                }
            })
            .buffer_unordered(self.config.llm_concurrency.max(1))
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubSummarizer;

    #[async_trait]
    impl Summarizer for StubSummarizer {
        async fn summarize_meeting(&self, _text: &str) -> Result<String> {
            Ok("## Summary\nstub".to_string())
        }

        async fn summarize_item(
            &self,
            title: &str,
            _text: &str,
            shared_context: Option<&str>,
            _page_count: Option<u32>,
        ) -> Result<ItemSummary> {
            Ok(ItemSummary {
                summary: format!("{title}|shared={}", shared_context.is_some()),
                topics: vec!["housing".into()],
            })
        }
    }

    fn analyzer() -> Analyzer {
        Analyzer::new(Arc::new(StubSummarizer), AnalyzerConfig::default()).unwrap()
    }

    fn request(id: &str) -> ItemRequest {
        ItemRequest {
            item_id: id.to_string(),
            title: format!("Item {id}"),
            text: "body".to_string(),
            page_count: None,
        }
    }

    #[tokio::test]
    async fn batch_returns_one_result_per_request() {
        let analyzer = analyzer();
        let requests = vec![request("a"), request("b"), request("c")];
        let results: Vec<ItemResult> = analyzer.summarize_items(requests, None).collect().await;

        assert_eq!(results.len(), 3);
        let mut ids: Vec<&str> = results.iter().map(|r| r.item_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(results.iter().all(|r| r.outcome.is_ok()));
    }

    #[tokio::test]
    async fn shared_context_reaches_every_call() {
        let analyzer = analyzer();
        let results: Vec<ItemResult> = analyzer
            .summarize_items(vec![request("a"), request("b")], Some("shared".into()))
            .collect()
            .await;

        for result in results {
            let summary = result.outcome.unwrap().summary;
            assert!(summary.ends_with("shared=true"));
        }
    }

    #[tokio::test]
    async fn empty_batch_completes_immediately() {
        let analyzer = analyzer();
        let results: Vec<ItemResult> = analyzer.summarize_items(Vec::new(), None).collect().await;
        assert!(results.is_empty());
    }
}
