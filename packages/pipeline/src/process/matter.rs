//! Matter processing: one summarization for a matter, back-filled onto
//! every item that references it.
//!
//! Attachments are aggregated and deduplicated across all of the matter's
//! appearances, summarized once, and the canonical summary plus the new
//! attachment hash land on the matter so future meeting passes reuse it.

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use analysis::ItemRequest;

use crate::attachments::hash_attachments;
use crate::error::{PipelineError, Result};
use crate::identity::validate_matter_id;
use crate::jobs::MatterJob;

use crate::models::{AgendaItem, Attachment};
use crate::process::documents::{is_likely_public_comment_compilation, is_low_value_name};
use crate::process::Processor;

impl Processor {
    pub(crate) async fn process_matter(&self, job: &MatterJob) -> Result<()> {
        let matter_id = job.matter_id.as_str();
        info!(matter_id, "processing matter");

        if !validate_matter_id(matter_id) {
            return Err(PipelineError::Validation(format!(
                "invalid matter_id format: {matter_id}"
            )));
        }

        let items = self.load_matter_items(job).await?;
        if items.is_empty() {
            error!(matter_id, "no items found for matter");
            return Err(PipelineError::Validation(format!(
                "matter {matter_id} has no items"
            )));
        }

        let attachments = dedupe_attachments(&items);
        info!(
            matter_id,
            appearances = items.len(),
            unique_attachments = attachments.len(),
            "matter aggregation complete"
        );

        if attachments.is_empty() {
            debug!(matter_id, "matter skipped, no attachments");
            return Ok(());
        }

        let representative = &items[0];
        let text = self.extract_matter_text(&attachments).await?;

        let request = ItemRequest {
            item_id: representative.id.clone(),
            title: representative.title.clone(),
            text,
            page_count: None,
        };

        let mut results = self.analyzer.summarize_items(vec![request], None);
        let result = results.next().await.ok_or_else(|| {
            PipelineError::Validation("no result returned from batch processing".into())
        })?;
        let summary = result.outcome?;

        let topics = self.normalizer.normalize(&summary.topics);
        let attachment_hash = hash_attachments(&attachments);

        self.store
            .matters
            .update_canonical_summary(
                matter_id,
                &summary.summary,
                &topics,
                &attachment_hash,
                Some(&attachments),
            )
            .await?;

        let item_ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        let backfilled = self
            .store
            .items
            .bulk_update_summaries(&item_ids, &summary.summary, &topics)
            .await?;

        info!(matter_id, backfilled, "canonical summary stored and items back-filled");
        Ok(())
    }

    /// Resolve the matter's items: payload IDs first, then the store.
    async fn load_matter_items(&self, job: &MatterJob) -> Result<Vec<AgendaItem>> {
        let mut items = Vec::new();
        for item_id in &job.item_ids {
            if let Some(item) = self.store.items.get(item_id).await? {
                items.push(item);
            }
        }

        if items.is_empty() {
            warn!(matter_id = %job.matter_id, "no items in payload, querying store");
            items = self.store.items.for_matter(&job.matter_id).await?;
        }

        Ok(items)
    }

    /// Fetch and extract the matter's attachments into one document string.
    async fn extract_matter_text(&self, attachments: &[Attachment]) -> Result<String> {
        let mut parts = Vec::new();

        for attachment in attachments {
            if !attachment.kind.is_extractable() {
                continue;
            }
            let label = if attachment.name.is_empty() {
                attachment.url.as_str()
            } else {
                attachment.name.as_str()
            };
            if is_low_value_name(label) {
                info!(attachment = label, "skipping low-value attachment");
                continue;
            }

            match self.analyzer.extract_document(&attachment.url).await {
                Ok(extraction) => {
                    if is_likely_public_comment_compilation(&extraction, label) {
                        continue;
                    }
                    parts.push(format!("=== {label} ===\n{}", extraction.text));
                }
                Err(e) => {
                    warn!(attachment = label, error = %e, "failed to extract attachment");
                }
            }
        }

        if parts.is_empty() {
            return Err(PipelineError::Validation(
                "no text extracted from matter attachments".into(),
            ));
        }

        Ok(parts.join("\n\n"))
    }
}

/// Union of attachments across items, deduplicated by URL, order of first
/// appearance preserved.
fn dedupe_attachments(items: &[AgendaItem]) -> Vec<Attachment> {
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();
    for item in items {
        for attachment in item.attachments() {
            if !attachment.url.is_empty() && seen.insert(attachment.url.clone()) {
                unique.push(attachment.clone());
            }
        }
    }
    unique
}
