//! Agenda item repository.

use std::collections::HashMap;

use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use crate::error::Result;
use crate::models::AgendaItem;

#[derive(Clone)]
pub struct ItemRepository {
    pool: PgPool,
}

impl ItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, item_id: &str) -> Result<Option<AgendaItem>> {
        let item = sqlx::query_as::<_, AgendaItem>("SELECT * FROM items WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    pub async fn for_meeting(&self, meeting_id: &str) -> Result<Vec<AgendaItem>> {
        let items = sqlx::query_as::<_, AgendaItem>(
            "SELECT * FROM items WHERE meeting_id = $1 ORDER BY sequence",
        )
        .bind(meeting_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Batched lookup for several meetings at once, avoiding N+1 reads.
    pub async fn for_meetings(
        &self,
        meeting_ids: &[String],
    ) -> Result<HashMap<String, Vec<AgendaItem>>> {
        if meeting_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let items = sqlx::query_as::<_, AgendaItem>(
            "SELECT * FROM items WHERE meeting_id = ANY($1) ORDER BY meeting_id, sequence",
        )
        .bind(meeting_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<String, Vec<AgendaItem>> = HashMap::new();
        for item in items {
            grouped.entry(item.meeting_id.clone()).or_default().push(item);
        }
        Ok(grouped)
    }

    /// Every item referencing a matter, across all meetings.
    pub async fn for_matter(&self, matter_id: &str) -> Result<Vec<AgendaItem>> {
        let items = sqlx::query_as::<_, AgendaItem>(
            "SELECT * FROM items WHERE matter_id = $1 ORDER BY created_at",
        )
        .bind(matter_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Upsert a meeting's items inside the caller's transaction. Rows are
    /// written whole; ingestion pre-merges preserved summaries.
    pub async fn store_for_meeting(
        &self,
        meeting_id: &str,
        items: &[AgendaItem],
        conn: &mut PgConnection,
    ) -> Result<usize> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO items (
                    id, meeting_id, title, sequence, attachments, attachment_hash,
                    matter_id, matter_file, matter_type, agenda_number, sponsors,
                    summary, topics, filter_reason
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                ON CONFLICT (id) DO UPDATE SET
                    title = EXCLUDED.title,
                    sequence = EXCLUDED.sequence,
                    attachments = EXCLUDED.attachments,
                    attachment_hash = EXCLUDED.attachment_hash,
                    matter_id = EXCLUDED.matter_id,
                    matter_file = EXCLUDED.matter_file,
                    matter_type = EXCLUDED.matter_type,
                    agenda_number = EXCLUDED.agenda_number,
                    sponsors = EXCLUDED.sponsors,
                    summary = EXCLUDED.summary,
                    topics = EXCLUDED.topics,
                    filter_reason = EXCLUDED.filter_reason
                "#,
            )
            .bind(&item.id)
            .bind(meeting_id)
            .bind(&item.title)
            .bind(item.sequence)
            .bind(&item.attachments)
            .bind(&item.attachment_hash)
            .bind(&item.matter_id)
            .bind(&item.matter_file)
            .bind(&item.matter_type)
            .bind(&item.agenda_number)
            .bind(&item.sponsors)
            .bind(&item.summary)
            .bind(&item.topics)
            .bind(&item.filter_reason)
            .execute(&mut *conn)
            .await?;
        }

        Ok(items.len())
    }

    /// Write a summary onto one item.
    pub async fn update_summary(
        &self,
        item_id: &str,
        summary: &str,
        topics: &[String],
    ) -> Result<()> {
        sqlx::query("UPDATE items SET summary = $2, topics = $3 WHERE id = $1")
            .bind(item_id)
            .bind(summary)
            .bind(Json(topics.to_vec()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Back-fill one summary across all items of a matter.
    pub async fn bulk_update_summaries(
        &self,
        item_ids: &[String],
        summary: &str,
        topics: &[String],
    ) -> Result<u64> {
        if item_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("UPDATE items SET summary = $2, topics = $3 WHERE id = ANY($1)")
            .bind(item_ids)
            .bind(summary)
            .bind(Json(topics.to_vec()))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Simple full-text lookup over titles and summaries.
    pub async fn search(&self, banana: &str, query: &str, limit: i64) -> Result<Vec<AgendaItem>> {
        let items = sqlx::query_as::<_, AgendaItem>(
            r#"
            SELECT i.* FROM items i
            JOIN meetings m ON m.id = i.meeting_id
            WHERE m.banana = $1
              AND to_tsvector('english', i.title || ' ' || COALESCE(i.summary, ''))
                  @@ plainto_tsquery('english', $2)
            ORDER BY i.created_at DESC
            LIMIT $3
            "#,
        )
        .bind(banana)
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}
