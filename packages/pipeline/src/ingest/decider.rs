//! Enqueue policy: what needs processing, and how urgently.
//!
//! Priority tracks date proximity — meetings closest to today (past or
//! future) run first. Meetings score 0–150; matters sit below them at
//! −100–50 so meeting work always wins a contended queue.

use chrono::{DateTime, Utc};

use crate::models::{AgendaItem, Matter, Meeting};

const MEETING_PRIORITY_BASE: i64 = 150;
const MEETING_PRIORITY_FLOOR: i64 = 0;

const MATTER_PRIORITY_BASE: i64 = 50;
const MATTER_PRIORITY_FLOOR: i64 = -100;

/// Distance used when a meeting has no date: effectively minimum priority.
const UNDATED_DISTANCE_DAYS: i64 = 999;

/// Decides whether a meeting needs processing.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnqueueDecider;

impl EnqueueDecider {
    pub fn new() -> Self {
        Self
    }

    /// A meeting needs processing iff at least one item lacks both a
    /// summary and a filter reason, or — with no items at all — no
    /// monolithic summary exists yet.
    pub fn should_enqueue(
        &self,
        meeting: &Meeting,
        agenda_items: &[AgendaItem],
    ) -> (bool, Option<String>) {
        if !agenda_items.is_empty() {
            let unprocessed = agenda_items
                .iter()
                .filter(|item| item.summary.is_none() && item.filter_reason.is_none())
                .count();
            if unprocessed == 0 {
                return (
                    false,
                    Some(format!("all {} items already processed", agenda_items.len())),
                );
            }
            return (true, None);
        }

        if meeting.summary.is_some() {
            return (false, Some("meeting already has summary (monolithic)".into()));
        }

        (true, None)
    }

    /// Meeting priority: `max(0, 150 - |days from now|)`.
    pub fn calculate_priority(&self, meeting_date: Option<DateTime<Utc>>) -> i32 {
        priority_from_distance(meeting_date, MEETING_PRIORITY_BASE, MEETING_PRIORITY_FLOOR)
    }
}

/// Decides whether a matter needs (re-)summarization.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatterEnqueueDecider;

impl MatterEnqueueDecider {
    pub fn new() -> Self {
        Self
    }

    /// A matter needs processing iff it has attachments and either no
    /// canonical summary exists or the stored attachment hash no longer
    /// matches the current one.
    pub fn should_enqueue_matter(
        &self,
        existing_matter: Option<&Matter>,
        current_attachment_hash: &str,
        has_attachments: bool,
    ) -> (bool, Option<&'static str>) {
        if !has_attachments {
            return (false, Some("no_attachments"));
        }

        let Some(matter) = existing_matter else {
            return (true, None);
        };

        if matter.canonical_summary.is_none() {
            return (true, None);
        }

        if matter.attachment_hash() == Some(current_attachment_hash) {
            return (false, Some("attachments_unchanged"));
        }

        (true, None)
    }

    /// Matter priority: `max(-100, 50 - |days from now|)`.
    pub fn calculate_priority(&self, meeting_date: Option<DateTime<Utc>>) -> i32 {
        priority_from_distance(meeting_date, MATTER_PRIORITY_BASE, MATTER_PRIORITY_FLOOR)
    }
}

fn priority_from_distance(date: Option<DateTime<Utc>>, base: i64, floor: i64) -> i32 {
    let days_distance = date
        .map(|d| (d - Utc::now()).num_days().abs())
        .unwrap_or(UNDATED_DISTANCE_DAYS);
    (base - days_distance).max(floor) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::types::Json;

    fn meeting(summary: Option<&str>) -> Meeting {
        Meeting {
            id: "paloaltoCA_1a2b3c4d".into(),
            banana: "paloaltoCA".into(),
            title: "City Council".into(),
            date: None,
            agenda_url: Some("https://city.gov/agenda".into()),
            packet_url: None,
            summary: summary.map(String::from),
            participation: None,
            status: None,
            topics: None,
            processing_status: Default::default(),
            processing_method: None,
            processing_time: None,
            committee_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn item(summary: Option<&str>, filter_reason: Option<&str>) -> AgendaItem {
        AgendaItem {
            id: "paloaltoCA_1a2b3c4d_1".into(),
            meeting_id: "paloaltoCA_1a2b3c4d".into(),
            title: "Item".into(),
            sequence: 0,
            attachments: Json(vec![]),
            attachment_hash: None,
            matter_id: None,
            matter_file: None,
            matter_type: None,
            agenda_number: None,
            sponsors: None,
            summary: summary.map(String::from),
            topics: None,
            filter_reason: filter_reason.map(String::from),
            created_at: None,
        }
    }

    #[test]
    fn unprocessed_items_trigger_enqueue() {
        let decider = EnqueueDecider::new();
        let items = vec![item(Some("done"), None), item(None, None)];
        let (enqueue, _) = decider.should_enqueue(&meeting(None), &items);
        assert!(enqueue);
    }

    #[test]
    fn fully_processed_items_skip_enqueue() {
        let decider = EnqueueDecider::new();
        let items = vec![item(Some("done"), None), item(None, Some("procedural_title"))];
        let (enqueue, reason) = decider.should_enqueue(&meeting(None), &items);
        assert!(!enqueue);
        assert!(reason.unwrap().contains("already processed"));
    }

    #[test]
    fn itemless_meeting_without_summary_enqueues() {
        let decider = EnqueueDecider::new();
        let (enqueue, _) = decider.should_enqueue(&meeting(None), &[]);
        assert!(enqueue);
    }

    #[test]
    fn monolithic_summary_skips_enqueue() {
        let decider = EnqueueDecider::new();
        let (enqueue, reason) = decider.should_enqueue(&meeting(Some("summary")), &[]);
        assert!(!enqueue);
        assert!(reason.unwrap().contains("monolithic"));
    }

    #[test]
    fn priority_peaks_for_today() {
        let decider = EnqueueDecider::new();
        assert_eq!(decider.calculate_priority(Some(Utc::now())), 150);
    }

    #[test]
    fn priority_decays_with_distance_in_both_directions() {
        let decider = EnqueueDecider::new();
        let future = decider.calculate_priority(Some(Utc::now() + Duration::days(10)));
        let past = decider.calculate_priority(Some(Utc::now() - Duration::days(10)));
        assert!(future <= 150 && future >= 139);
        assert!(past <= 150 && past >= 139);
    }

    #[test]
    fn undated_meetings_get_floor_priority() {
        let decider = EnqueueDecider::new();
        assert_eq!(decider.calculate_priority(None), 0);
    }

    #[test]
    fn matter_priority_floor_is_negative() {
        let decider = MatterEnqueueDecider::new();
        assert_eq!(decider.calculate_priority(None), -100);
        assert_eq!(decider.calculate_priority(Some(Utc::now())), 50);
    }

    fn matter(summary: Option<&str>, hash: Option<&str>) -> Matter {
        Matter {
            id: "paloaltoCA_7a8f3b2c1d9e4f5a".into(),
            banana: "paloaltoCA".into(),
            matter_file: Some("BL2025-1098".into()),
            matter_id: None,
            matter_type: None,
            title: None,
            sponsors: None,
            canonical_summary: summary.map(String::from),
            canonical_topics: None,
            attachments: None,
            metadata: hash.map(|h| {
                Json(crate::models::MatterMetadata {
                    attachment_hash: Some(h.to_string()),
                })
            }),
            first_seen: None,
            last_seen: None,
            appearance_count: 1,
            status: "active".into(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn new_matter_with_attachments_enqueues() {
        let decider = MatterEnqueueDecider::new();
        let (enqueue, _) = decider.should_enqueue_matter(None, "abc", true);
        assert!(enqueue);
    }

    #[test]
    fn matter_without_attachments_never_enqueues() {
        let decider = MatterEnqueueDecider::new();
        let (enqueue, reason) = decider.should_enqueue_matter(None, "", false);
        assert!(!enqueue);
        assert_eq!(reason, Some("no_attachments"));
    }

    #[test]
    fn unchanged_attachments_skip_reprocessing() {
        let decider = MatterEnqueueDecider::new();
        let existing = matter(Some("summary"), Some("abc"));
        let (enqueue, reason) = decider.should_enqueue_matter(Some(&existing), "abc", true);
        assert!(!enqueue);
        assert_eq!(reason, Some("attachments_unchanged"));
    }

    #[test]
    fn changed_attachments_reprocess() {
        let decider = MatterEnqueueDecider::new();
        let existing = matter(Some("summary"), Some("abc"));
        let (enqueue, _) = decider.should_enqueue_matter(Some(&existing), "def", true);
        assert!(enqueue);
    }

    #[test]
    fn missing_summary_reprocesses_even_with_matching_hash() {
        let decider = MatterEnqueueDecider::new();
        let existing = matter(None, Some("abc"));
        let (enqueue, _) = decider.should_enqueue_matter(Some(&existing), "abc", true);
        assert!(enqueue);
    }
}
