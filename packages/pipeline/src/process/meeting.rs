//! Meeting processing: the item-level path and the monolithic fallback.
//!
//! Item-level is the golden path. Items whose matter already carries a
//! canonical summary are back-filled without an LLM call; items whose
//! matter's attachments changed are deferred to a matter job; the rest are
//! summarized here with results persisted as each call completes, so a
//! partial batch leaves later items pending rather than losing everything.

use std::collections::HashMap;
use std::time::Instant;

use futures::StreamExt;
use tracing::{debug, info, warn};

use analysis::{parse_participation_info, ItemRequest, ParticipationInfo};

use crate::attachments::hash_attachments;
use crate::error::{PipelineError, Result};
use crate::jobs::{matter_source_url, JobPayload, MatterJob};
use crate::models::{AgendaItem, Matter, Meeting};
use crate::process::documents::{build_document_cache, is_low_value_name};
use crate::process::{ProcessRunStats, Processor};

/// Stand-in text for items whose documents are all meeting-level shared
/// context.
const SHARED_ONLY_TEXT: &str =
    "This item is covered entirely by the meeting-level documents above.";

/// An item that ended the run with a summary, for meeting aggregation.
struct ProcessedItem {
    topics: Vec<String>,
}

impl Processor {
    pub(crate) async fn process_meeting(&self, meeting: &Meeting) -> Result<ProcessRunStats> {
        self.store.meetings.mark_processing_started(&meeting.id).await?;

        let result = self.process_meeting_inner(meeting).await;
        if result.is_err() {
            // Best effort; the job row carries the error either way.
            let _ = self.store.meetings.mark_processing_failed(&meeting.id).await;
        }
        result
    }

    async fn process_meeting_inner(&self, meeting: &Meeting) -> Result<ProcessRunStats> {
        let items = self.store.items.for_meeting(&meeting.id).await?;

        if !items.is_empty() {
            info!(meeting_id = %meeting.id, item_count = items.len(), "processing at item level");
            return self.process_meeting_items(meeting, items).await;
        }

        if let Some(packet_url) = meeting.packet_url_first() {
            info!(meeting_id = %meeting.id, "no items, processing packet as monolithic unit");
            return self.process_packet(meeting, packet_url).await;
        }

        debug!(meeting_id = %meeting.id, "no items or packet, display-only meeting");
        self.store
            .meetings
            .update_summary(&meeting.id, None, "display_only", 0.0, None, None)
            .await?;
        Ok(ProcessRunStats::default())
    }

    /// Monolithic fallback: one packet, one summary.
    async fn process_packet(&self, meeting: &Meeting, packet_url: &str) -> Result<ProcessRunStats> {
        let started = Instant::now();
        let packet = self.analyzer.process_packet(packet_url).await?;

        let participation = merge_participation(packet.participation, meeting);

        self.store
            .meetings
            .update_summary(
                &meeting.id,
                Some(&packet.summary),
                packet.processing_method,
                started.elapsed().as_secs_f64(),
                None,
                participation.as_ref(),
            )
            .await?;

        info!(
            meeting_id = %meeting.id,
            duration_secs = started.elapsed().as_secs(),
            "packet processed"
        );

        Ok(ProcessRunStats {
            processed: 1,
            items_processed: 1,
            items_new: 1,
            ..Default::default()
        })
    }

    /// The item-level path.
    async fn process_meeting_items(
        &self,
        meeting: &Meeting,
        items: Vec<AgendaItem>,
    ) -> Result<ProcessRunStats> {
        let started = Instant::now();
        let mut stats = ProcessRunStats { processed: 1, ..Default::default() };

        let mut participation = self.participation_from_agenda(meeting).await;

        // Partition: reuse, defer to a matter job, or process here.
        let matter_ids: Vec<String> = items.iter().filter_map(|i| i.matter_id.clone()).collect();
        let matters = self.store.matters.get_batch(&matter_ids).await?;

        let mut processed: Vec<ProcessedItem> = Vec::new();
        let mut need_processing: Vec<&AgendaItem> = Vec::new();
        let mut failed_items: Vec<String> = Vec::new();

        for item in &items {
            if item.filter_reason.is_some() {
                debug!(title = %item.title, "skipping filtered item");
                stats.items_skipped += 1;
                continue;
            }
            if item.attachments().is_empty() {
                debug!(title = %item.title, "skipping item without attachments");
                stats.items_skipped += 1;
                continue;
            }
            if is_low_value_name(&item.title) {
                info!(title = %item.title, "skipping low-value item");
                stats.items_skipped += 1;
                continue;
            }

            if let Some(matter) = item.matter_id.as_deref().and_then(|id| matters.get(id)) {
                if matter.canonical_summary.is_some() {
                    let current_hash = hash_attachments(item.attachments());
                    if matter.attachment_hash() == Some(current_hash.as_str()) {
                        self.reuse_canonical_summary(item, matter).await?;
                        processed.push(ProcessedItem {
                            topics: matter
                                .canonical_topics
                                .as_ref()
                                .map(|t| t.0.clone())
                                .unwrap_or_default(),
                        });
                        stats.items_skipped += 1;
                        continue;
                    }

                    // Attachments moved under the matter; one matter job
                    // re-summarizes and back-fills every sibling item.
                    self.enqueue_matter_job(meeting, matter, &current_hash, item).await?;
                    stats.items_skipped += 1;
                    continue;
                }
            }

            if item.summary.is_some() {
                debug!(title = %item.title, "item already processed");
                processed.push(ProcessedItem {
                    topics: item.topics.as_ref().map(|t| t.0.clone()).unwrap_or_default(),
                });
                stats.items_skipped += 1;
                continue;
            }

            need_processing.push(item);
        }

        if !need_processing.is_empty() {
            let (new_processed, new_failed) = self
                .summarize_new_items(&items, &need_processing, &mut participation)
                .await?;
            stats.items_new += new_processed.len();
            processed.extend(new_processed);
            failed_items.extend(new_failed);
        } else {
            info!(item_count = processed.len(), "all items already processed");
        }

        stats.items_failed = failed_items.len();
        stats.items_processed = processed.len();

        if processed.is_empty() {
            if !failed_items.is_empty() {
                return Err(PipelineError::Validation(format!(
                    "no items could be processed ({} failed)",
                    failed_items.len()
                )));
            }
            warn!(meeting_id = %meeting.id, "nothing to process");
            return Ok(stats);
        }

        let meeting_topics = aggregate_topics(&processed);
        let participation = merge_participation(participation, meeting);

        self.store
            .meetings
            .update_summary(
                &meeting.id,
                None,
                &format!("item_level_{}_items", processed.len()),
                started.elapsed().as_secs_f64(),
                Some(&meeting_topics),
                participation.as_ref(),
            )
            .await?;

        info!(
            meeting_id = %meeting.id,
            processed = stats.items_processed,
            new = stats.items_new,
            skipped = stats.items_skipped,
            failed = stats.items_failed,
            duration_secs = started.elapsed().as_secs(),
            "item processing completed"
        );

        Ok(stats)
    }

    /// Build the document cache and run the LLM batch, persisting each
    /// result as it lands.
    async fn summarize_new_items(
        &self,
        all_items: &[AgendaItem],
        need_processing: &[&AgendaItem],
        participation: &mut Option<ParticipationInfo>,
    ) -> Result<(Vec<ProcessedItem>, Vec<String>)> {
        let owned: Vec<AgendaItem> = need_processing.iter().map(|i| (*i).clone()).collect();
        let cache = build_document_cache(self.analyzer.as_ref(), &owned).await;
        let shared_context = cache.shared_context();

        let sequences: Vec<i32> = all_items.iter().map(|i| i.sequence).collect();
        let first_sequence = sequences.iter().min().copied();
        let last_sequence = sequences.iter().max().copied();

        let mut requests = Vec::new();
        let mut failed: Vec<String> = Vec::new();
        let item_map: HashMap<&str, &AgendaItem> =
            need_processing.iter().map(|i| (i.id.as_str(), *i)).collect();

        for item in need_processing {
            let (text, page_count) = match cache.item_text(&item.id) {
                Some((text, pages)) => (text, Some(pages)),
                None if shared_context.is_some()
                    && cache.item_urls.get(&item.id).is_some_and(|u| !u.is_empty()) =>
                {
                    (SHARED_ONLY_TEXT.to_string(), None)
                }
                None => {
                    warn!(title = %item.title, "no text extracted for item");
                    failed.push(item.title.clone());
                    continue;
                }
            };

            // Contact info tends to live on the first and last items.
            if Some(item.sequence) == first_sequence || Some(item.sequence) == last_sequence {
                if let Some(parsed) = parse_participation_info(&text) {
                    match participation {
                        Some(existing) => existing.merge_missing_from(&parsed),
                        None => *participation = Some(parsed),
                    }
                }
            }

            requests.push(ItemRequest {
                item_id: item.id.clone(),
                title: item.title.clone(),
                text,
                page_count,
            });
        }

        let mut processed = Vec::new();
        let mut last_error: Option<analysis::AnalysisError> = None;

        let mut results = self.analyzer.summarize_items(requests, shared_context);
        while let Some(result) = results.next().await {
            let Some(item) = item_map.get(result.item_id.as_str()) else {
                warn!(item_id = %result.item_id, "no item mapping for result");
                continue;
            };

            match result.outcome {
                Ok(summary) => {
                    let topics = self.normalizer.normalize(&summary.topics);
                    self.store
                        .items
                        .update_summary(&item.id, &summary.summary, &topics)
                        .await?;

                    if let Some(matter_id) = item.matter_id.as_deref() {
                        self.store
                            .matters
                            .update_canonical_summary(
                                matter_id,
                                &summary.summary,
                                &topics,
                                &hash_attachments(item.attachments()),
                                None,
                            )
                            .await?;
                    }

                    info!(title = %item.title, "item saved");
                    processed.push(ProcessedItem { topics });
                }
                Err(e) => {
                    warn!(title = %item.title, error = %e, "item summarization failed");
                    failed.push(item.title.clone());
                    last_error = Some(e);
                }
            }
        }

        // A batch that produced nothing but failures should retry with the
        // real error class, not report success.
        if processed.is_empty() && !failed.is_empty() {
            if let Some(e) = last_error {
                return Err(e.into());
            }
        }

        Ok((processed, failed))
    }

    /// Back-fill a canonical summary onto an item that lacks one.
    async fn reuse_canonical_summary(&self, item: &AgendaItem, matter: &Matter) -> Result<()> {
        debug!(title = %item.title, "reusing canonical summary from matter");
        if item.summary.is_none() {
            let summary = matter.canonical_summary.as_deref().unwrap_or_default();
            let topics = matter
                .canonical_topics
                .as_ref()
                .map(|t| t.0.clone())
                .unwrap_or_default();
            self.store.items.update_summary(&item.id, summary, &topics).await?;
        }
        Ok(())
    }

    /// Enqueue a matter job covering every item that references the matter.
    async fn enqueue_matter_job(
        &self,
        meeting: &Meeting,
        matter: &Matter,
        current_hash: &str,
        item: &AgendaItem,
    ) -> Result<()> {
        let (should_enqueue, skip_reason) = self.matter_decider.should_enqueue_matter(
            Some(matter),
            current_hash,
            !item.attachments().is_empty(),
        );
        if !should_enqueue {
            debug!(matter_id = %matter.id, reason = skip_reason.unwrap_or(""), "matter job skipped");
            return Ok(());
        }

        let item_ids: Vec<String> = self
            .store
            .items
            .for_matter(&matter.id)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect();

        let priority = self.matter_decider.calculate_priority(meeting.date);
        self.store
            .queue
            .enqueue(
                &matter_source_url(&matter.id),
                &JobPayload::Matter(MatterJob {
                    matter_id: matter.id.clone(),
                    meeting_id: meeting.id.clone(),
                    item_ids,
                }),
                Some(&meeting.id),
                Some(&meeting.banana),
                priority,
                self.config.stale_threshold_minutes,
            )
            .await?;

        info!(matter_id = %matter.id, priority, "matter job enqueued for changed attachments");
        Ok(())
    }

    /// Participation info from the agenda document, when it is a PDF.
    async fn participation_from_agenda(&self, meeting: &Meeting) -> Option<ParticipationInfo> {
        let agenda_url = meeting.agenda_url.as_deref()?;
        let lowered = agenda_url.to_lowercase();
        if !lowered.ends_with(".pdf") && !lowered.contains(".ashx") {
            return None;
        }

        match self.analyzer.extract_participation(agenda_url).await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "failed to extract participation from agenda");
                None
            }
        }
    }
}

/// Union of per-item topics ordered by frequency, ties by first
/// appearance.
fn aggregate_topics(processed: &[ProcessedItem]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for item in processed {
        for topic in &item.topics {
            if !counts.contains_key(topic.as_str()) {
                order.push(topic);
            }
            *counts.entry(topic).or_default() += 1;
        }
    }

    let mut ranked: Vec<(usize, &str)> = order
        .iter()
        .enumerate()
        .map(|(idx, topic)| (idx, *topic))
        .collect();
    ranked.sort_by_key(|(first_seen, topic)| (std::cmp::Reverse(counts[topic]), *first_seen));

    ranked.into_iter().map(|(_, topic)| topic.to_string()).collect()
}

/// Parsed participation wins field-by-field; the vendor record fills gaps.
fn merge_participation(
    parsed: Option<ParticipationInfo>,
    meeting: &Meeting,
) -> Option<ParticipationInfo> {
    let vendor = meeting.participation.as_ref().map(|p| p.0.clone());
    match (parsed, vendor) {
        (Some(mut parsed), Some(vendor)) => {
            parsed.merge_missing_from(&vendor);
            Some(parsed)
        }
        (Some(parsed), None) => Some(parsed),
        (None, vendor) => vendor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_rank_by_frequency_then_first_seen() {
        let processed = vec![
            ProcessedItem { topics: vec!["housing".into(), "zoning".into()] },
            ProcessedItem { topics: vec!["budget".into(), "housing".into()] },
            ProcessedItem { topics: vec!["housing".into()] },
        ];
        let aggregated = aggregate_topics(&processed);
        assert_eq!(aggregated[0], "housing");
        assert_eq!(aggregated[1], "zoning");
        assert_eq!(aggregated[2], "budget");
    }

    #[test]
    fn empty_items_aggregate_to_nothing() {
        assert!(aggregate_topics(&[]).is_empty());
    }
}
