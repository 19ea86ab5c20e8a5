//! Engagic core pipeline.
//!
//! Turns vendor meeting listings into deduplicated, summarized civic
//! records:
//!
//! - [`ingest`] transforms vendor records into meetings, agenda items,
//!   matters, and appearances under one transaction per record
//! - [`store`] is the Postgres content store: a pool plus one repository
//!   per entity
//! - [`jobs`] + [`store::queue`] form the durable priority queue with
//!   retries, dead-lettering, and stale-job recovery
//! - [`process`] consumes the queue: item-level and monolithic meeting
//!   summarization, matter-first deduplication, canonical-summary reuse
//! - [`identity`] generates the deterministic IDs everything else keys on
//!
//! Vendor scrapers, the HTTP API, and the email subsystems live elsewhere;
//! this crate starts at the adapter contract ([`models::records`]) and ends
//! at the content store.

pub mod attachments;
pub mod config;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod jobs;
pub mod models;
pub mod process;
pub mod store;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use store::Store;
