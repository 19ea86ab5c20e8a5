//! Typed errors for the analysis library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can
//! distinguish retryable failures (network, rate limits, timeouts) from
//! permanent ones (bad PDFs, malformed responses).

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during document analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Client construction or missing credentials
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP transport failure while downloading a document
    #[error("download failed for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response while downloading a document
    #[error("HTTP {status} downloading {url}")]
    HttpStatus { status: u16, url: String },

    /// PDF parsing failed
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// PDF extraction exceeded its hard budget
    #[error("extraction timed out after {0:?}")]
    ExtractionTimeout(Duration),

    /// Document produced no usable text
    #[error("no text extracted from document")]
    EmptyDocument,

    /// LLM provider asked us to back off
    #[error("rate limited by LLM provider: {0}")]
    RateLimited(String),

    /// LLM call exceeded its budget
    #[error("LLM call timed out after {0:?}")]
    LlmTimeout(Duration),

    /// LLM returned a permanent error or an unusable response
    #[error("LLM error: {0}")]
    Llm(String),
}

impl AnalysisError {
    /// Whether retrying the same operation could plausibly succeed.
    ///
    /// Transport errors, 5xx responses, rate limits, and LLM timeouts are
    /// transient. Parse failures and 4xx responses are not: the same URL
    /// will fail the same way next time.
    pub fn is_retryable(&self) -> bool {
        match self {
            AnalysisError::Config(_) => false,
            AnalysisError::Http { .. } => true,
            AnalysisError::HttpStatus { status, .. } => *status >= 500,
            AnalysisError::RateLimited(_) => true,
            AnalysisError::LlmTimeout(_) => true,
            AnalysisError::Extraction(_) => false,
            AnalysisError::ExtractionTimeout(_) => false,
            AnalysisError::EmptyDocument => false,
            AnalysisError::Llm(_) => false,
        }
    }
}

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        let err = AnalysisError::HttpStatus {
            status: 503,
            url: "https://city.gov/agenda.pdf".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn client_errors_are_permanent() {
        let err = AnalysisError::HttpStatus {
            status: 404,
            url: "https://city.gov/missing.pdf".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn rate_limits_are_retryable() {
        assert!(AnalysisError::RateLimited("429".into()).is_retryable());
        assert!(AnalysisError::LlmTimeout(Duration::from_secs(300)).is_retryable());
    }

    #[test]
    fn extraction_failures_are_permanent() {
        assert!(!AnalysisError::Extraction("bad xref".into()).is_retryable());
        assert!(!AnalysisError::EmptyDocument.is_retryable());
    }
}
