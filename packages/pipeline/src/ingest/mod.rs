//! Ingestion orchestrator: vendor record → meeting + items + matters +
//! appearances, atomically, then an enqueue decision.
//!
//! One transaction per vendor record. Schema-validation failures are
//! counted and skipped, never raised; anything else rolls the transaction
//! back and propagates. Re-ingesting the same record is a no-op apart from
//! timestamps: IDs are deterministic, upserts preserve summaries, and
//! appearance creation is idempotent.

pub mod decider;
pub mod filter;
pub mod votes;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::types::Json;
use tracing::{debug, error, info, warn};

pub use decider::{EnqueueDecider, MatterEnqueueDecider};
pub use filter::MatterFilter;
pub use votes::{VoteProcessor, VoteResult};

use crate::attachments::hash_attachments;
use crate::error::Result;
use crate::identity::generate_meeting_id;
use crate::identity::generate_matter_id;
use crate::jobs::{JobPayload, MeetingJob};
use crate::models::{
    records::{ItemRecord, MeetingRecord},
    AgendaItem, City, Matter, MatterMetadata, Meeting, ProcessingStatus,
};
use crate::store::{EnqueueOutcome, Store};

/// Per-record ingestion counters.
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    pub items_stored: usize,
    pub items_skipped_procedural: usize,
    pub matters_tracked: usize,
    pub matters_duplicate: usize,
    pub appearances_created: usize,
    pub meetings_skipped: usize,
    pub skip_reason: Option<String>,
    pub skipped_title: Option<String>,
}

impl SyncStats {
    fn skipped(reason: &str, title: Option<String>) -> Self {
        Self {
            meetings_skipped: 1,
            skip_reason: Some(reason.to_string()),
            skipped_title: title,
            ..Default::default()
        }
    }
}

/// Single entry point for meeting sync operations.
pub struct MeetingSync {
    store: Store,
    matter_filter: MatterFilter,
    enqueue_decider: EnqueueDecider,
    vote_processor: VoteProcessor,
    stale_threshold_minutes: i64,
}

impl MeetingSync {
    pub fn new(store: Store, stale_threshold_minutes: i64) -> Self {
        Self {
            store,
            matter_filter: MatterFilter::new(),
            enqueue_decider: EnqueueDecider::new(),
            vote_processor: VoteProcessor::new(),
            stale_threshold_minutes,
        }
    }

    /// Ingest one raw vendor payload for a city.
    pub async fn sync_meeting(
        &self,
        payload: serde_json::Value,
        city: &City,
    ) -> Result<(Option<Meeting>, SyncStats)> {
        let title_hint = payload
            .get("title")
            .and_then(|t| t.as_str())
            .map(String::from);

        let record = match MeetingRecord::from_value(payload) {
            Ok(record) => record,
            Err(e) => {
                error!(
                    city = %city.banana,
                    title = title_hint.as_deref().unwrap_or("Unknown"),
                    error = %e,
                    "adapter output failed schema validation"
                );
                return Ok((None, SyncStats::skipped("schema_validation_failed", title_hint)));
            }
        };

        self.sync_record(record, city).await
    }

    /// Ingest one already-validated vendor record.
    pub async fn sync_record(
        &self,
        record: MeetingRecord,
        city: &City,
    ) -> Result<(Option<Meeting>, SyncStats)> {
        let mut stats = SyncStats::default();

        let meeting_date = parse_meeting_date(record.start.as_deref());
        let meeting_id = generate_meeting_id(
            &city.banana,
            &record.meeting_id,
            meeting_date.map(|d| d.naive_utc()),
            &record.title,
        );

        let committee = self.lookup_committee(&city.banana, &record.title).await?;

        let mut meeting = Meeting {
            id: meeting_id.clone(),
            banana: city.banana.clone(),
            title: record.title.clone(),
            date: meeting_date,
            agenda_url: record.agenda_url.clone(),
            packet_url: record.packet_url.clone().map(Json),
            summary: None,
            participation: record.participation.clone().map(Json),
            status: record.meeting_status.clone(),
            topics: None,
            processing_status: ProcessingStatus::Pending,
            processing_method: None,
            processing_time: None,
            committee_id: committee.as_ref().map(|c| c.0.clone()),
            created_at: None,
            updated_at: None,
        };

        // Summaries are written only by the processor and never lost to a
        // resync. Item-level meetings carry their results in topics and
        // processing fields rather than a monolithic summary.
        if let Some(existing) = self.store.meetings.get(&meeting.id).await? {
            if existing.summary.is_some()
                || existing.processing_status == ProcessingStatus::Completed
            {
                meeting.summary = existing.summary;
                meeting.processing_status = existing.processing_status;
                meeting.processing_method = existing.processing_method;
                meeting.processing_time = existing.processing_time;
                meeting.topics = existing.topics;
                debug!(meeting_id = %meeting.id, "preserved existing summary");
            }
        }

        let item_records = record.items.as_deref().unwrap_or(&[]);
        let agenda_items = self
            .build_agenda_items(&meeting, item_records, &mut stats)
            .await?;

        let mut tx = self.store.begin().await?;
        self.store.meetings.store(&meeting, &mut tx).await?;

        let mut vote_results: Vec<(String, String, VoteResult)> = Vec::new();
        if !agenda_items.is_empty() {
            self.track_matters(&meeting, item_records, &agenda_items, &mut vote_results, &mut stats, &mut tx)
                .await?;

            stats.items_stored = self
                .store
                .items
                .store_for_meeting(&meeting.id, &agenda_items, &mut tx)
                .await?;

            stats.appearances_created = self
                .create_appearances(&meeting, &agenda_items, committee.as_ref(), &mut tx)
                .await?;

            for (matter_id, item_id, result) in &vote_results {
                if let Some(outcome) = result.outcome {
                    self.store
                        .matters
                        .update_appearance_outcome(
                            matter_id,
                            &meeting.id,
                            item_id,
                            outcome,
                            &result.tally,
                            &mut tx,
                        )
                        .await?;
                }
            }
        }
        tx.commit().await?;

        self.enqueue_if_needed(&meeting, &agenda_items).await?;

        info!(
            meeting_id = %meeting.id,
            items = stats.items_stored,
            matters_tracked = stats.matters_tracked,
            appearances = stats.appearances_created,
            "meeting ingested"
        );

        Ok((Some(meeting), stats))
    }

    async fn lookup_committee(
        &self,
        banana: &str,
        meeting_title: &str,
    ) -> Result<Option<(String, String)>> {
        let name = committee_name_from_title(meeting_title);
        if name.is_empty() {
            return Ok(None);
        }
        Ok(self
            .store
            .committees
            .find_by_name(banana, name)
            .await?
            .map(|c| (c.id, c.name)))
    }

    /// Build the item rows: composite IDs, attachment hashes, matter IDs,
    /// procedural filtering, and preservation of existing summaries.
    async fn build_agenda_items(
        &self,
        meeting: &Meeting,
        item_records: &[ItemRecord],
        stats: &mut SyncStats,
    ) -> Result<Vec<AgendaItem>> {
        if item_records.is_empty() {
            return Ok(Vec::new());
        }

        let existing: std::collections::HashMap<String, AgendaItem> = self
            .store
            .items
            .for_meeting(&meeting.id)
            .await?
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();

        let mut agenda_items = Vec::with_capacity(item_records.len());
        for record in item_records {
            let item_id = format!("{}_{}", meeting.id, record.item_id);
            let filter_reason = self
                .matter_filter
                .filter_reason(&record.title, record.matter_type.as_deref());

            let matter_id = if filter_reason.is_some() {
                stats.items_skipped_procedural += 1;
                None
            } else if record.matter_file.is_some() || record.matter_id.is_some() {
                generate_matter_id(
                    &meeting.banana,
                    record.matter_file.as_deref(),
                    record.matter_id.as_deref(),
                    None,
                )?
            } else {
                None
            };

            let attachment_hash = if record.attachments.is_empty() {
                None
            } else {
                Some(hash_attachments(&record.attachments))
            };

            let mut item = AgendaItem {
                id: item_id.clone(),
                meeting_id: meeting.id.clone(),
                title: record.title.clone(),
                sequence: record.sequence,
                attachments: Json(record.attachments.clone()),
                attachment_hash,
                matter_id,
                matter_file: record.matter_file.clone(),
                matter_type: record.matter_type.clone(),
                agenda_number: record.agenda_number.clone(),
                sponsors: record.sponsors.clone().map(Json),
                summary: None,
                topics: None,
                filter_reason,
                created_at: None,
            };

            if let Some(previous) = existing.get(&item_id) {
                if previous.summary.is_some() {
                    item.summary = previous.summary.clone();
                    item.topics = previous.topics.clone();
                }
            }

            agenda_items.push(item);
        }

        Ok(agenda_items)
    }

    /// Create or update matter rows for every tracked item, collect vote
    /// results for the appearance pass, and apply sponsors.
    async fn track_matters(
        &self,
        meeting: &Meeting,
        item_records: &[ItemRecord],
        agenda_items: &[AgendaItem],
        vote_results: &mut Vec<(String, String, VoteResult)>,
        stats: &mut SyncStats,
        tx: &mut sqlx::PgConnection,
    ) -> Result<()> {
        let records_by_id: std::collections::HashMap<&str, &ItemRecord> = item_records
            .iter()
            .map(|r| (r.item_id.as_str(), r))
            .collect();

        for item in agenda_items {
            let Some(matter_id) = item.matter_id.as_deref() else {
                continue;
            };

            let record = item
                .id
                .strip_prefix(&format!("{}_", meeting.id))
                .and_then(|vendor_item_id| records_by_id.get(vendor_item_id).copied());

            let current_hash = hash_attachments(item.attachments());
            let existing = self.store.matters.get_with(matter_id, tx).await?;

            match existing {
                Some(matter) => {
                    let appearance_exists = self
                        .store
                        .matters
                        .has_appearance(matter_id, &meeting.id, tx)
                        .await?;
                    let attachments_changed =
                        hash_attachments(matter.attachments()) != current_hash;

                    self.store
                        .matters
                        .update_tracking(
                            matter_id,
                            meeting.date,
                            item.attachments(),
                            attachments_changed,
                            !appearance_exists,
                            tx,
                        )
                        .await?;
                    stats.matters_duplicate += 1;

                    if !appearance_exists {
                        info!(
                            matter = item.matter_file.as_deref().unwrap_or(matter_id),
                            "matter new appearance"
                        );
                    }
                }
                None => {
                    let sponsors = record.and_then(|r| r.sponsors.clone());
                    let matter = Matter {
                        id: matter_id.to_string(),
                        banana: meeting.banana.clone(),
                        matter_file: item.matter_file.clone(),
                        matter_id: record.and_then(|r| r.matter_id.clone()),
                        matter_type: item.matter_type.clone(),
                        title: Some(item.title.clone()),
                        sponsors: sponsors.clone().map(Json),
                        canonical_summary: None,
                        canonical_topics: None,
                        attachments: Some(Json(item.attachments().to_vec())),
                        metadata: Some(Json(MatterMetadata {
                            attachment_hash: Some(current_hash.clone()),
                        })),
                        first_seen: meeting.date,
                        last_seen: meeting.date,
                        appearance_count: 1,
                        status: "active".into(),
                        created_at: None,
                        updated_at: None,
                    };

                    self.store.matters.insert(&matter, tx).await?;
                    stats.matters_tracked += 1;

                    info!(
                        matter = item.matter_file.as_deref().unwrap_or(matter_id),
                        matter_type = item.matter_type.as_deref().unwrap_or(""),
                        "new matter tracked"
                    );

                    if let Some(sponsors) = sponsors.filter(|s| !s.is_empty()) {
                        self.store
                            .members
                            .link_sponsors_to_matter(
                                &meeting.banana,
                                matter_id,
                                &sponsors,
                                meeting.date,
                                tx,
                            )
                            .await?;
                    }
                }
            }

            if let Some(votes) = record.and_then(|r| r.votes.as_deref()).filter(|v| !v.is_empty()) {
                self.store
                    .members
                    .record_votes_for_matter(
                        &meeting.banana,
                        matter_id,
                        &meeting.id,
                        votes,
                        meeting.date,
                        tx,
                    )
                    .await?;
                vote_results.push((
                    matter_id.to_string(),
                    item.id.clone(),
                    self.vote_processor.process(votes),
                ));
            }
        }

        Ok(())
    }

    /// Create `(matter, meeting, item)` appearances once items exist.
    async fn create_appearances(
        &self,
        meeting: &Meeting,
        agenda_items: &[AgendaItem],
        committee: Option<&(String, String)>,
        tx: &mut sqlx::PgConnection,
    ) -> Result<usize> {
        let committee_display = committee_name_from_title(&meeting.title);
        let mut count = 0;

        for item in agenda_items {
            let Some(matter_id) = item.matter_id.as_deref() else {
                continue;
            };

            self.store
                .matters
                .create_appearance(
                    matter_id,
                    &meeting.id,
                    &item.id,
                    meeting.date,
                    Some(committee_display).filter(|c| !c.is_empty()),
                    committee.map(|(id, _)| id.as_str()),
                    item.sequence,
                    tx,
                )
                .await?;
            count += 1;
        }

        Ok(count)
    }

    /// Enqueue a meeting job when the decider says the meeting still needs
    /// processing. Matter jobs are the processor's to create.
    async fn enqueue_if_needed(&self, meeting: &Meeting, agenda_items: &[AgendaItem]) -> Result<()> {
        let (should_enqueue, skip_reason) =
            self.enqueue_decider.should_enqueue(meeting, agenda_items);

        if !should_enqueue {
            if let Some(reason) = skip_reason {
                debug!(meeting_id = %meeting.id, reason, "skipping enqueue");
            }
            return Ok(());
        }

        if agenda_items.is_empty() && meeting.packet_url_first().is_none() {
            debug!(
                meeting_id = %meeting.id,
                "no items or packet, stored for display only"
            );
            return Ok(());
        }

        let Some(source_url) = meeting.source_url() else {
            warn!(meeting_id = %meeting.id, "meeting has no source url, skipping queue");
            return Ok(());
        };

        let priority = self.enqueue_decider.calculate_priority(meeting.date);
        let outcome = self
            .store
            .queue
            .enqueue(
                source_url,
                &JobPayload::Meeting(MeetingJob {
                    meeting_id: meeting.id.clone(),
                }),
                Some(&meeting.id),
                Some(&meeting.banana),
                priority,
                self.stale_threshold_minutes,
            )
            .await?;

        if outcome != EnqueueOutcome::AlreadyQueued {
            info!(meeting_id = %meeting.id, priority, ?outcome, "meeting enqueued for processing");
        }

        Ok(())
    }
}

/// The committee portion of a meeting title: everything before a "-"
/// separator, or the whole title.
fn committee_name_from_title(title: &str) -> &str {
    match title.split_once('-') {
        Some((head, _)) => head.trim(),
        None => title.trim(),
    }
}

/// Parse a vendor start string: ISO-8601 first, then common US formats.
pub fn parse_meeting_date(start: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = start?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    for fmt in ["%m/%d/%y", "%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
        }
    }

    None
}
