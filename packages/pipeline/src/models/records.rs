//! Vendor adapter contract.
//!
//! Adapters hand the pipeline untyped JSON. This module is the validation
//! boundary: payloads deserialize into these records, `validate` enforces
//! the invariants serde cannot, and everything downstream consumes the
//! typed record only. Records that fail here are skipped with reason
//! `schema_validation_failed` — they never reach the database.

use serde::{Deserialize, Serialize};

use analysis::ParticipationInfo;

use crate::error::{PipelineError, Result};

/// A packet URL from a vendor: a single PDF or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PacketUrl {
    Single(String),
    Many(Vec<String>),
}

impl PacketUrl {
    /// The first usable URL, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            PacketUrl::Single(url) => Some(url.as_str()).filter(|u| !u.is_empty()),
            PacketUrl::Many(urls) => urls.iter().map(String::as_str).find(|u| !u.is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first().is_none()
    }
}

/// Attachment media types adapters may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Pdf,
    Doc,
    Spreadsheet,
    #[default]
    #[serde(other)]
    Unknown,
}

impl AttachmentKind {
    /// Whether this attachment is worth fetching for text extraction.
    pub fn is_extractable(&self) -> bool {
        matches!(self, AttachmentKind::Pdf | AttachmentKind::Doc | AttachmentKind::Unknown)
    }
}

/// One attachment on an agenda item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: AttachmentKind,
}

/// A vendor vote entry on an agenda item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub name: String,
    pub vote: String,
    #[serde(default)]
    pub sequence: Option<i32>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// One row on a vendor agenda.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub item_id: String,
    pub title: String,
    /// Order on the agenda. Must arrive as an integer, not a string.
    pub sequence: i32,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Vendor backend identifier (UUID, numeric).
    #[serde(default)]
    pub matter_id: Option<String>,
    /// Official public file number, e.g. "BL2025-1098".
    #[serde(default)]
    pub matter_file: Option<String>,
    #[serde(default)]
    pub matter_type: Option<String>,
    #[serde(default)]
    pub agenda_number: Option<String>,
    #[serde(default)]
    pub sponsors: Option<Vec<String>>,
    #[serde(default)]
    pub votes: Option<Vec<VoteRecord>>,
}

impl ItemRecord {
    fn validate(&self) -> Result<()> {
        if self.item_id.trim().is_empty() {
            return Err(PipelineError::Validation("item_id cannot be empty".into()));
        }
        if self.title.trim().is_empty() {
            return Err(PipelineError::Validation(format!(
                "item {} has an empty title",
                self.item_id
            )));
        }
        if self.sequence < 0 {
            return Err(PipelineError::Validation(format!(
                "item {} has negative sequence {}",
                self.item_id, self.sequence
            )));
        }
        for attachment in &self.attachments {
            if attachment.url.trim().is_empty() {
                return Err(PipelineError::Validation(format!(
                    "item {} has an attachment with an empty URL",
                    self.item_id
                )));
            }
        }
        Ok(())
    }
}

/// One scheduled meeting from a vendor adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingRecord {
    /// Adapter-stable identifier; required.
    pub meeting_id: String,
    pub title: String,
    /// ISO-8601 start time as a string; a missing or unparseable value
    /// leaves the meeting undated.
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub agenda_url: Option<String>,
    #[serde(default)]
    pub packet_url: Option<PacketUrl>,
    /// Omitted entirely when the adapter does not scrape items.
    #[serde(default)]
    pub items: Option<Vec<ItemRecord>>,
    #[serde(default)]
    pub participation: Option<ParticipationInfo>,
    #[serde(default)]
    pub meeting_status: Option<String>,
    /// Vendor-specific extras; ignored by the core.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl MeetingRecord {
    /// Deserialize and validate one adapter payload.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let record: MeetingRecord = serde_json::from_value(value)
            .map_err(|e| PipelineError::Validation(format!("adapter schema mismatch: {e}")))?;
        record.validate()?;
        Ok(record)
    }

    /// Enforce the invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.meeting_id.trim().is_empty() {
            return Err(PipelineError::Validation("meeting_id cannot be empty".into()));
        }
        if self.title.trim().is_empty() {
            return Err(PipelineError::Validation(format!(
                "meeting {} has an empty title",
                self.meeting_id
            )));
        }

        let has_agenda = self.agenda_url.as_deref().is_some_and(|u| !u.trim().is_empty());
        let has_packet = self.packet_url.as_ref().is_some_and(|p| !p.is_empty());
        if !has_agenda && !has_packet {
            return Err(PipelineError::Validation(format!(
                "meeting {} has no agenda_url or packet_url",
                self.meeting_id
            )));
        }

        if let Some(items) = &self.items {
            for item in items {
                item.validate()?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_record() -> serde_json::Value {
        json!({
            "meeting_id": "12345",
            "title": "City Council",
            "start": "2025-11-05T19:00:00",
            "agenda_url": "https://city.gov/agenda/12345"
        })
    }

    #[test]
    fn minimal_record_validates() {
        let record = MeetingRecord::from_value(minimal_record()).unwrap();
        assert_eq!(record.meeting_id, "12345");
        assert!(record.items.is_none());
    }

    #[test]
    fn missing_urls_are_rejected() {
        let value = json!({"meeting_id": "1", "title": "Council"});
        assert!(MeetingRecord::from_value(value).is_err());
    }

    #[test]
    fn blank_meeting_id_is_rejected() {
        let value = json!({
            "meeting_id": "   ",
            "title": "Council",
            "agenda_url": "https://city.gov/a"
        });
        assert!(MeetingRecord::from_value(value).is_err());
    }

    #[test]
    fn string_sequence_is_rejected() {
        let value = json!({
            "meeting_id": "1",
            "title": "Council",
            "agenda_url": "https://city.gov/a",
            "items": [{"item_id": "i1", "title": "Item", "sequence": "0"}]
        });
        assert!(MeetingRecord::from_value(value).is_err());
    }

    #[test]
    fn negative_sequence_is_rejected() {
        let value = json!({
            "meeting_id": "1",
            "title": "Council",
            "agenda_url": "https://city.gov/a",
            "items": [{"item_id": "i1", "title": "Item", "sequence": -1}]
        });
        assert!(MeetingRecord::from_value(value).is_err());
    }

    #[test]
    fn packet_url_accepts_string_or_list() {
        let single = json!({
            "meeting_id": "1", "title": "Council", "packet_url": "https://city.gov/p.pdf"
        });
        let record = MeetingRecord::from_value(single).unwrap();
        assert_eq!(record.packet_url.unwrap().first(), Some("https://city.gov/p.pdf"));

        let many = json!({
            "meeting_id": "1", "title": "Council",
            "packet_url": ["https://city.gov/a.pdf", "https://city.gov/b.pdf"]
        });
        let record = MeetingRecord::from_value(many).unwrap();
        assert_eq!(record.packet_url.unwrap().first(), Some("https://city.gov/a.pdf"));
    }

    #[test]
    fn empty_packet_list_does_not_satisfy_url_invariant() {
        let value = json!({
            "meeting_id": "1", "title": "Council", "packet_url": []
        });
        assert!(MeetingRecord::from_value(value).is_err());
    }

    #[test]
    fn unknown_attachment_types_map_to_unknown() {
        let value = json!({
            "meeting_id": "1",
            "title": "Council",
            "agenda_url": "https://city.gov/a",
            "items": [{
                "item_id": "i1",
                "title": "Item",
                "sequence": 0,
                "attachments": [{"name": "Map", "url": "https://city.gov/m", "type": "shapefile"}]
            }]
        });
        let record = MeetingRecord::from_value(value).unwrap();
        let items = record.items.unwrap();
        assert_eq!(items[0].attachments[0].kind, AttachmentKind::Unknown);
    }

    #[test]
    fn votes_round_trip() {
        let value = json!({
            "meeting_id": "1",
            "title": "Council",
            "agenda_url": "https://city.gov/a",
            "items": [{
                "item_id": "i1",
                "title": "Ordinance",
                "sequence": 0,
                "votes": [{"name": "Smith", "vote": "yes"}, {"name": "Jones", "vote": "no"}]
            }]
        });
        let record = MeetingRecord::from_value(value).unwrap();
        let votes = record.items.unwrap()[0].votes.clone().unwrap();
        assert_eq!(votes.len(), 2);
        assert_eq!(votes[0].vote, "yes");
    }
}
