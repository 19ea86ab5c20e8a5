//! Trait seams for replaceable analysis components.

pub mod summarizer;

pub use summarizer::{ItemSummary, Summarizer};
