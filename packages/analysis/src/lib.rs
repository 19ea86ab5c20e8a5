//! Document analysis for civic agendas.
//!
//! This crate turns agenda attachments into summaries:
//!
//! - [`fetch`] downloads documents over HTTP with periodic client recycling
//! - [`extract`] pulls text out of PDFs on a blocking thread with a hard timeout
//! - [`traits`] defines the [`Summarizer`](traits::Summarizer) seam
//! - [`ai`] implements the summarizer over Gemini via rig
//! - [`analyzer`] orchestrates fetch → extract → summarize with bounded concurrency
//! - [`participation`] parses contact/streaming info out of agenda text
//! - [`topics`] collapses LLM topic tags into a controlled vocabulary
//!
//! The pipeline crate consumes this library through the `Analyzer` and the
//! `Summarizer` trait; implementations are replaceable.

pub mod ai;
pub mod analyzer;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod participation;
pub mod prompts;
pub mod topics;
pub mod traits;

pub use ai::GeminiSummarizer;
pub use analyzer::{Analyzer, AnalyzerConfig, ItemRequest, ItemResult, PacketResult};
pub use error::{AnalysisError, Result};
pub use extract::{Extraction, PdfExtractor};
pub use fetch::DocumentFetcher;
pub use participation::{parse_participation_info, EmailContext, ParticipationInfo, StreamingUrl};
pub use topics::TopicNormalizer;
pub use traits::{ItemSummary, Summarizer};
