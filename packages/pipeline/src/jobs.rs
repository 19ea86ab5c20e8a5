//! Typed queue job payloads.
//!
//! A queue row carries `job_type` plus a JSON payload. Decoding switches
//! on `job_type`; unknown types are malformed and the worker fails them
//! without retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use crate::error::{PipelineError, Result};

pub const JOB_TYPE_MEETING: &str = "meeting";
pub const JOB_TYPE_MATTER: &str = "matter";

/// Process a meeting (item-level or monolithic). The processor loads the
/// meeting from the store, so only the ID travels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingJob {
    pub meeting_id: String,
}

/// Process a matter across all of its appearances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatterJob {
    /// Composite matter ID.
    pub matter_id: String,
    /// Representative meeting where the matter appeared.
    pub meeting_id: String,
    /// Every agenda item referencing the matter at enqueue time.
    pub item_ids: Vec<String>,
}

/// The payload union, discriminated by the row's `job_type` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPayload {
    Meeting(MeetingJob),
    Matter(MatterJob),
}

impl JobPayload {
    pub fn job_type(&self) -> &'static str {
        match self {
            JobPayload::Meeting(_) => JOB_TYPE_MEETING,
            JobPayload::Matter(_) => JOB_TYPE_MATTER,
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        match self {
            JobPayload::Meeting(job) => serde_json::json!(job),
            JobPayload::Matter(job) => serde_json::json!(job),
        }
    }
}

/// Queue job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "queue_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    DeadLetter,
}

/// A raw queue row as stored.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct QueueJobRow {
    pub id: i64,
    /// Dedup key: the URL (or synthetic key) that caused the enqueue.
    pub source_url: String,
    pub meeting_id: Option<String>,
    pub banana: Option<String>,
    pub job_type: String,
    pub payload: Json<serde_json::Value>,
    pub priority: i32,
    pub status: QueueStatus,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl QueueJobRow {
    /// Decode the typed payload by switching on `job_type`.
    pub fn decode_payload(&self) -> Result<JobPayload> {
        let value = self.payload.0.clone();
        match self.job_type.as_str() {
            JOB_TYPE_MEETING => serde_json::from_value(value)
                .map(JobPayload::Meeting)
                .map_err(|e| self.malformed(format!("bad meeting payload: {e}"))),
            JOB_TYPE_MATTER => serde_json::from_value(value)
                .map(JobPayload::Matter)
                .map_err(|e| self.malformed(format!("bad matter payload: {e}"))),
            other => Err(self.malformed(format!("unknown job_type: {other}"))),
        }
    }

    fn malformed(&self, reason: String) -> PipelineError {
        PipelineError::MalformedJob { id: self.id, reason }
    }
}

/// Synthetic dedup key for matter jobs, which have no single document URL.
pub fn matter_source_url(matter_id: &str) -> String {
    format!("matter://{matter_id}")
}
