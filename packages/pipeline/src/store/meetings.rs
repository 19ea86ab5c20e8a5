//! Meeting repository.
//!
//! Summaries are written only by the processor; ingestion pre-merges
//! existing summary fields into the row it stores, so the upsert here
//! writes whole rows without special cases.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use analysis::ParticipationInfo;

use crate::error::Result;
use crate::models::{Meeting, ProcessingStatus};

#[derive(Clone)]
pub struct MeetingRepository {
    pool: PgPool,
}

impl MeetingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, meeting_id: &str) -> Result<Option<Meeting>> {
        let meeting = sqlx::query_as::<_, Meeting>("SELECT * FROM meetings WHERE id = $1")
            .bind(meeting_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(meeting)
    }

    pub async fn for_city(&self, banana: &str, limit: i64) -> Result<Vec<Meeting>> {
        let meetings = sqlx::query_as::<_, Meeting>(
            "SELECT * FROM meetings WHERE banana = $1 ORDER BY date DESC NULLS LAST LIMIT $2",
        )
        .bind(banana)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(meetings)
    }

    /// Upsert one meeting inside the caller's transaction.
    pub async fn store(&self, meeting: &Meeting, conn: &mut PgConnection) -> Result<()> {
        meeting.validate()?;

        sqlx::query(
            r#"
            INSERT INTO meetings (
                id, banana, title, date, agenda_url, packet_url, summary,
                participation, status, topics, processing_status,
                processing_method, processing_time, committee_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                date = EXCLUDED.date,
                agenda_url = EXCLUDED.agenda_url,
                packet_url = EXCLUDED.packet_url,
                summary = EXCLUDED.summary,
                participation = EXCLUDED.participation,
                status = EXCLUDED.status,
                topics = EXCLUDED.topics,
                processing_status = EXCLUDED.processing_status,
                processing_method = EXCLUDED.processing_method,
                processing_time = EXCLUDED.processing_time,
                committee_id = EXCLUDED.committee_id,
                updated_at = NOW()
            "#,
        )
        .bind(&meeting.id)
        .bind(&meeting.banana)
        .bind(&meeting.title)
        .bind(meeting.date)
        .bind(&meeting.agenda_url)
        .bind(&meeting.packet_url)
        .bind(&meeting.summary)
        .bind(&meeting.participation)
        .bind(&meeting.status)
        .bind(&meeting.topics)
        .bind(meeting.processing_status)
        .bind(&meeting.processing_method)
        .bind(meeting.processing_time)
        .bind(&meeting.committee_id)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Write processing results. `summary` is None on the item-level path,
    /// where the per-item summaries are the payload and the meeting row
    /// carries aggregates only.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_summary(
        &self,
        meeting_id: &str,
        summary: Option<&str>,
        processing_method: &str,
        processing_time: f64,
        topics: Option<&[String]>,
        participation: Option<&ParticipationInfo>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE meetings
            SET summary = COALESCE($2, summary),
                processing_method = $3,
                processing_time = $4,
                topics = COALESCE($5, topics),
                participation = COALESCE($6, participation),
                processing_status = 'completed',
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(meeting_id)
        .bind(summary)
        .bind(processing_method)
        .bind(processing_time)
        .bind(topics.map(|t| Json(t.to_vec())))
        .bind(participation.map(|p| Json(p.clone())))
        .execute(&self.pool)
        .await?;

        info!(meeting_id, processing_method, "meeting processing recorded");
        Ok(())
    }

    pub async fn mark_processing_started(&self, meeting_id: &str) -> Result<()> {
        self.set_processing_status(meeting_id, ProcessingStatus::Processing).await
    }

    pub async fn mark_processing_failed(&self, meeting_id: &str) -> Result<()> {
        self.set_processing_status(meeting_id, ProcessingStatus::Failed).await
    }

    async fn set_processing_status(
        &self,
        meeting_id: &str,
        status: ProcessingStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE meetings SET processing_status = $2, updated_at = NOW() WHERE id = $1")
            .bind(meeting_id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Reset meetings stuck in `processing` past the staleness threshold.
    /// Mirrors the queue sweep so both views of progress recover together.
    pub async fn reset_stale_processing(&self, threshold_minutes: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE meetings
            SET processing_status = 'pending', updated_at = NOW()
            WHERE processing_status = 'processing'
              AND updated_at < NOW() - make_interval(mins => $1::int)
            "#,
        )
        .bind(threshold_minutes as i32)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, meeting_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM meetings WHERE id = $1")
            .bind(meeting_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Meetings within a date window, for digest queries.
    pub async fn in_window(
        &self,
        banana: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Meeting>> {
        let meetings = sqlx::query_as::<_, Meeting>(
            "SELECT * FROM meetings WHERE banana = $1 AND date >= $2 AND date < $3 ORDER BY date",
        )
        .bind(banana)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(meetings)
    }
}
