//! PDF text extraction.
//!
//! Extraction is CPU-bound, so it runs under `spawn_blocking` with a hard
//! timeout rather than on the async runtime. pdf-extract can panic on
//! malformed PDFs, so the call is wrapped in `catch_unwind`.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tracing::{debug, error};

use crate::error::{AnalysisError, Result};

/// Hard budget for extracting a single document. Large scanned packets can
/// take minutes; anything past this is abandoned.
pub const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(600);

/// A page is counted as OCR-only when extraction yields less text than this.
/// Scanned pages have no embedded text layer.
const OCR_PAGE_CHAR_FLOOR: usize = 25;

/// Result of extracting text from one document.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub page_count: u32,
    /// Pages that yielded (almost) no text — in practice, scanned pages.
    pub ocr_pages: u32,
}

impl Extraction {
    /// Ratio of text-free pages, used by public-comment compilation
    /// detection. Zero for empty documents.
    pub fn ocr_ratio(&self) -> f64 {
        if self.page_count == 0 {
            return 0.0;
        }
        self.ocr_pages as f64 / self.page_count as f64
    }
}

/// PDF text extractor backed by pdf-extract.
#[derive(Debug, Default, Clone)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract text from PDF bytes synchronously.
    ///
    /// Callers on the async runtime should use [`extract`](Self::extract),
    /// which moves this onto a blocking thread.
    pub fn extract_from_bytes(&self, bytes: &[u8]) -> Result<Extraction> {
        let pages = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(bytes)
        }))
        .map_err(|_| AnalysisError::Extraction("pdf parser panicked".into()))?
        .map_err(|e| AnalysisError::Extraction(e.to_string()))?;

        let page_count = pages.len() as u32;
        let ocr_pages = pages
            .iter()
            .filter(|p| p.trim().len() < OCR_PAGE_CHAR_FLOOR)
            .count() as u32;

        let text = pages.join("\n");
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyDocument);
        }

        Ok(Extraction {
            text,
            page_count,
            ocr_pages,
        })
    }

    /// Extract text from PDF bytes off the async runtime, with the hard
    /// timeout from [`EXTRACTION_TIMEOUT`].
    pub async fn extract(&self, bytes: Vec<u8>) -> Result<Extraction> {
        let extractor = self.clone();
        let handle =
            tokio::task::spawn_blocking(move || extractor.extract_from_bytes(&bytes));

        match tokio::time::timeout(EXTRACTION_TIMEOUT, handle).await {
            Ok(Ok(result)) => {
                if let Ok(extraction) = &result {
                    debug!(
                        pages = extraction.page_count,
                        ocr_pages = extraction.ocr_pages,
                        chars = extraction.text.len(),
                        "pdf extracted"
                    );
                }
                result
            }
            Ok(Err(join_err)) => Err(AnalysisError::Extraction(format!(
                "extraction task failed: {join_err}"
            ))),
            Err(_) => {
                error!(timeout = ?EXTRACTION_TIMEOUT, "pdf extraction timed out");
                Err(AnalysisError::ExtractionTimeout(EXTRACTION_TIMEOUT))
            }
        }
    }
}
