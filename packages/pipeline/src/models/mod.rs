//! Domain entities persisted by the content store.
//!
//! JSON-shaped columns (`participation`, `attachments`, `topics`,
//! `metadata`) use `sqlx::types::Json` so rows map straight onto these
//! structs.

pub mod records;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use analysis::ParticipationInfo;

pub use records::{Attachment, AttachmentKind, ItemRecord, MeetingRecord, PacketUrl, VoteRecord};

use crate::error::{PipelineError, Result};

/// A city: the tenant. Created by operators, not the pipeline.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct City {
    /// Short alphanumeric slug, city name + state: `paloaltoCA`.
    pub banana: String,
    pub name: String,
    pub state: String,
    pub vendor: String,
    pub slug: String,
    pub county: Option<String>,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Meeting processing lifecycle. Progresses pending → processing →
/// {completed, failed}; stale `processing` rows reset to pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "processing_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One scheduled meeting of a civic body.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Meeting {
    /// `{banana}_{8-hex-md5}` from the identity generator.
    pub id: String,
    pub banana: String,
    pub title: String,
    pub date: Option<DateTime<Utc>>,
    /// HTML agenda view.
    pub agenda_url: Option<String>,
    /// PDF packet; a single URL or a list.
    pub packet_url: Option<Json<PacketUrl>>,
    /// Monolithic LLM summary; written only by the processor.
    pub summary: Option<String>,
    pub participation: Option<Json<ParticipationInfo>>,
    /// cancelled, postponed, revised, rescheduled — None for normal.
    pub status: Option<String>,
    /// Topics aggregated from agenda items.
    pub topics: Option<Json<Vec<String>>>,
    pub processing_status: ProcessingStatus,
    pub processing_method: Option<String>,
    pub processing_time: Option<f64>,
    pub committee_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Meeting {
    /// Every meeting needs at least one source URL.
    pub fn validate(&self) -> Result<()> {
        if self.banana.is_empty() {
            return Err(PipelineError::Validation("meeting is missing a banana".into()));
        }
        let has_agenda = self.agenda_url.as_deref().is_some_and(|u| !u.is_empty());
        let has_packet = self.packet_url.as_ref().is_some_and(|p| !p.is_empty());
        if !has_agenda && !has_packet {
            return Err(PipelineError::Validation(format!(
                "meeting {} has no agenda_url or packet_url",
                self.id
            )));
        }
        Ok(())
    }

    /// The first packet URL, when one exists.
    pub fn packet_url_first(&self) -> Option<&str> {
        self.packet_url.as_ref().and_then(|p| p.first())
    }

    /// The URL that identifies this meeting's processing work in the queue.
    pub fn source_url(&self) -> Option<&str> {
        self.agenda_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| self.packet_url_first())
    }
}

/// One row on a meeting agenda.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct AgendaItem {
    /// `{meeting_id}_{vendor_item_id}`.
    pub id: String,
    pub meeting_id: String,
    pub title: String,
    /// Order on the agenda; non-negative.
    pub sequence: i32,
    pub attachments: Json<Vec<Attachment>>,
    /// SHA-256 over sorted `(url, name)` pairs; None without attachments.
    pub attachment_hash: Option<String>,
    /// Composite matter ID; None for untracked or procedural items.
    pub matter_id: Option<String>,
    pub matter_file: Option<String>,
    pub matter_type: Option<String>,
    pub agenda_number: Option<String>,
    pub sponsors: Option<Json<Vec<String>>>,
    pub summary: Option<String>,
    pub topics: Option<Json<Vec<String>>>,
    /// Non-null means the item was intentionally skipped and will never be
    /// summarized.
    pub filter_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl AgendaItem {
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments.0
    }

    pub fn sponsors(&self) -> &[String] {
        self.sponsors.as_ref().map(|s| s.0.as_slice()).unwrap_or(&[])
    }
}

/// Change-detection metadata on a matter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatterMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_hash: Option<String>,
}

/// A legislative matter tracked across meetings.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Matter {
    /// `{banana}_{16-hex-sha256}` from the identity generator.
    pub id: String,
    pub banana: String,
    /// Official public identifier, e.g. "BL2025-1098".
    pub matter_file: Option<String>,
    /// Vendor backend identifier.
    pub matter_id: Option<String>,
    pub matter_type: Option<String>,
    pub title: Option<String>,
    pub sponsors: Option<Json<Vec<String>>>,
    /// The single summary reused by every item referencing this matter.
    /// Changes only when the attachment hash changes.
    pub canonical_summary: Option<String>,
    pub canonical_topics: Option<Json<Vec<String>>>,
    pub attachments: Option<Json<Vec<Attachment>>>,
    pub metadata: Option<Json<MatterMetadata>>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub appearance_count: i32,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Matter {
    /// The attachment hash recorded at the last canonical summarization.
    pub fn attachment_hash(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.attachment_hash.as_deref())
    }

    pub fn attachments(&self) -> &[Attachment] {
        self.attachments.as_ref().map(|a| a.0.as_slice()).unwrap_or(&[])
    }
}

/// Aggregated vote counts for one matter appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub yes: u32,
    pub no: u32,
    pub abstain: u32,
    pub absent: u32,
    pub recused: u32,
}

/// One instance of a matter on one meeting's agenda.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct MatterAppearance {
    pub id: i64,
    pub matter_id: String,
    pub meeting_id: String,
    pub item_id: String,
    pub appeared_at: Option<DateTime<Utc>>,
    pub committee: Option<String>,
    pub committee_id: Option<String>,
    pub sequence: Option<i32>,
    pub vote_outcome: Option<String>,
    pub vote_tally: Option<Json<VoteTally>>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A civic body within a city (council, planning commission, ...).
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Committee {
    pub id: String,
    pub banana: String,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// A council member, deduplicated by normalized name within a city.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct CouncilMember {
    pub id: i64,
    pub banana: String,
    pub name: String,
    pub normalized_name: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meeting(agenda: Option<&str>, packet: Option<PacketUrl>) -> Meeting {
        Meeting {
            id: "paloaltoCA_1a2b3c4d".into(),
            banana: "paloaltoCA".into(),
            title: "City Council".into(),
            date: None,
            agenda_url: agenda.map(String::from),
            packet_url: packet.map(Json),
            summary: None,
            participation: None,
            status: None,
            topics: None,
            processing_status: ProcessingStatus::Pending,
            processing_method: None,
            processing_time: None,
            committee_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn meeting_requires_a_source_url() {
        assert!(meeting(None, None).validate().is_err());
        assert!(meeting(Some("https://city.gov/a"), None).validate().is_ok());
        assert!(meeting(None, Some(PacketUrl::Single("https://city.gov/p.pdf".into())))
            .validate()
            .is_ok());
    }

    #[test]
    fn source_url_prefers_agenda() {
        let m = meeting(
            Some("https://city.gov/a"),
            Some(PacketUrl::Single("https://city.gov/p.pdf".into())),
        );
        assert_eq!(m.source_url(), Some("https://city.gov/a"));
    }

    #[test]
    fn source_url_falls_back_to_packet() {
        let m = meeting(None, Some(PacketUrl::Many(vec!["https://city.gov/p.pdf".into()])));
        assert_eq!(m.source_url(), Some("https://city.gov/p.pdf"));
    }

    #[test]
    fn matter_metadata_survives_json_round_trip() {
        let metadata = MatterMetadata {
            attachment_hash: Some("abc123".into()),
        };
        let value = serde_json::to_value(&metadata).unwrap();
        let back: MatterMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(metadata, back);
    }

    #[test]
    fn processing_status_serializes_snake_case() {
        let status = serde_json::to_string(&ProcessingStatus::Pending).unwrap();
        assert_eq!(status, "\"pending\"");
    }
}
