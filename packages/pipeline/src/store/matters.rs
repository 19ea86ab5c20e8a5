//! Matter repository.
//!
//! Two hash fields matter here and they are not the same thing:
//! `city_matters.attachments` tracks what the matter currently carries
//! (refreshed on ingest), while `metadata.attachment_hash` records the
//! attachment set at the last canonical summarization. Change detection
//! compares an item's current hash against the metadata hash, so only the
//! canonical-summary write path may touch the metadata.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{Attachment, Matter, MatterAppearance, VoteTally};

#[derive(Clone)]
pub struct MatterRepository {
    pool: PgPool,
}

impl MatterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, matter_id: &str) -> Result<Option<Matter>> {
        let matter = sqlx::query_as::<_, Matter>("SELECT * FROM city_matters WHERE id = $1")
            .bind(matter_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(matter)
    }

    /// Read through the caller's transaction, seeing its uncommitted
    /// writes (two items in one meeting may share a matter).
    pub async fn get_with(
        &self,
        matter_id: &str,
        conn: &mut PgConnection,
    ) -> Result<Option<Matter>> {
        let matter = sqlx::query_as::<_, Matter>("SELECT * FROM city_matters WHERE id = $1")
            .bind(matter_id)
            .fetch_optional(conn)
            .await?;
        Ok(matter)
    }

    /// Batched lookup, keyed by matter ID.
    pub async fn get_batch(&self, matter_ids: &[String]) -> Result<HashMap<String, Matter>> {
        if matter_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let matters = sqlx::query_as::<_, Matter>("SELECT * FROM city_matters WHERE id = ANY($1)")
            .bind(matter_ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(matters.into_iter().map(|m| (m.id.clone(), m)).collect())
    }

    pub async fn for_city(&self, banana: &str, include_processed: bool) -> Result<Vec<Matter>> {
        let query = if include_processed {
            "SELECT * FROM city_matters WHERE banana = $1 ORDER BY created_at DESC"
        } else {
            "SELECT * FROM city_matters WHERE banana = $1 AND canonical_summary IS NULL \
             ORDER BY created_at DESC"
        };
        let matters = sqlx::query_as::<_, Matter>(query)
            .bind(banana)
            .fetch_all(&self.pool)
            .await?;
        Ok(matters)
    }

    /// Insert a newly tracked matter inside the caller's transaction.
    pub async fn insert(&self, matter: &Matter, conn: &mut PgConnection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO city_matters (
                id, banana, matter_file, matter_id, matter_type, title, sponsors,
                canonical_summary, canonical_topics, attachments, metadata,
                first_seen, last_seen, appearance_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                matter_type = EXCLUDED.matter_type,
                attachments = EXCLUDED.attachments,
                updated_at = NOW(),
                -- never clobber an existing canonical summary with NULL
                canonical_summary = COALESCE(EXCLUDED.canonical_summary, city_matters.canonical_summary),
                canonical_topics = COALESCE(EXCLUDED.canonical_topics, city_matters.canonical_topics)
            "#,
        )
        .bind(&matter.id)
        .bind(&matter.banana)
        .bind(&matter.matter_file)
        .bind(&matter.matter_id)
        .bind(&matter.matter_type)
        .bind(&matter.title)
        .bind(&matter.sponsors)
        .bind(&matter.canonical_summary)
        .bind(&matter.canonical_topics)
        .bind(&matter.attachments)
        .bind(&matter.metadata)
        .bind(matter.first_seen)
        .bind(matter.last_seen)
        .bind(matter.appearance_count)
        .execute(conn)
        .await?;

        debug!(matter_id = %matter.id, "matter stored");
        Ok(())
    }

    /// Update an existing matter on re-ingest: advance `last_seen`, count
    /// the new appearance, and refresh the attachment list when it changed.
    /// `metadata.attachment_hash` is deliberately left alone.
    pub async fn update_tracking(
        &self,
        matter_id: &str,
        meeting_date: Option<DateTime<Utc>>,
        attachments: &[Attachment],
        attachments_changed: bool,
        increment_appearance_count: bool,
        conn: &mut PgConnection,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE city_matters
            SET last_seen = GREATEST(COALESCE(last_seen, $2), COALESCE($2, last_seen)),
                appearance_count = appearance_count + $3,
                attachments = CASE WHEN $4 THEN $5 ELSE attachments END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(matter_id)
        .bind(meeting_date)
        .bind(if increment_appearance_count { 1 } else { 0 })
        .bind(attachments_changed)
        .bind(Json(attachments.to_vec()))
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Write the canonical summary and stamp the attachment hash it was
    /// computed from. This is the only path that touches the metadata hash.
    pub async fn update_canonical_summary(
        &self,
        matter_id: &str,
        summary: &str,
        topics: &[String],
        attachment_hash: &str,
        attachments: Option<&[Attachment]>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE city_matters
            SET canonical_summary = $2,
                canonical_topics = $3,
                metadata = jsonb_set(COALESCE(metadata, '{}'::jsonb),
                                     '{attachment_hash}', to_jsonb($4::text)),
                attachments = COALESCE($5, attachments),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(matter_id)
        .bind(summary)
        .bind(Json(topics.to_vec()))
        .bind(attachment_hash)
        .bind(attachments.map(|a| Json(a.to_vec())))
        .execute(&self.pool)
        .await?;

        info!(matter_id, "canonical summary stored");
        Ok(())
    }

    pub async fn has_appearance(
        &self,
        matter_id: &str,
        meeting_id: &str,
        conn: &mut PgConnection,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM matter_appearances WHERE matter_id = $1 AND meeting_id = $2)",
        )
        .bind(matter_id)
        .bind(meeting_id)
        .fetch_one(conn)
        .await?;
        Ok(exists)
    }

    /// Record one `(matter, meeting, item)` appearance; idempotent.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_appearance(
        &self,
        matter_id: &str,
        meeting_id: &str,
        item_id: &str,
        appeared_at: Option<DateTime<Utc>>,
        committee: Option<&str>,
        committee_id: Option<&str>,
        sequence: i32,
        conn: &mut PgConnection,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO matter_appearances (
                matter_id, meeting_id, item_id, appeared_at, committee, committee_id, sequence
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (matter_id, meeting_id, item_id) DO NOTHING
            "#,
        )
        .bind(matter_id)
        .bind(meeting_id)
        .bind(item_id)
        .bind(appeared_at)
        .bind(committee)
        .bind(committee_id)
        .bind(sequence)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Stamp a vote outcome onto one appearance.
    pub async fn update_appearance_outcome(
        &self,
        matter_id: &str,
        meeting_id: &str,
        item_id: &str,
        vote_outcome: &str,
        vote_tally: &VoteTally,
        conn: &mut PgConnection,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE matter_appearances
            SET vote_outcome = $4, vote_tally = $5
            WHERE matter_id = $1 AND meeting_id = $2 AND item_id = $3
            "#,
        )
        .bind(matter_id)
        .bind(meeting_id)
        .bind(item_id)
        .bind(vote_outcome)
        .bind(Json(vote_tally.clone()))
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn appearances(&self, matter_id: &str) -> Result<Vec<MatterAppearance>> {
        let appearances = sqlx::query_as::<_, MatterAppearance>(
            "SELECT * FROM matter_appearances WHERE matter_id = $1 ORDER BY appeared_at NULLS LAST",
        )
        .bind(matter_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(appearances)
    }
}
