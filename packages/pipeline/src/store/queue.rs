//! Durable job queue over the `queue` table.
//!
//! `source_url` is the dedup key. Enqueue semantics by current status:
//!
//! | status                        | action                                   |
//! |-------------------------------|------------------------------------------|
//! | new                           | insert as pending                        |
//! | pending                       | no-op                                    |
//! | processing, fresh             | no-op                                    |
//! | processing, stale             | reset to pending, retry_count++          |
//! | completed/failed/dead_letter  | reset to pending, clear error, new payload |
//!
//! Dequeue is a single atomic statement over `FOR UPDATE SKIP LOCKED`, so
//! concurrent workers always see disjoint jobs.

use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::jobs::{JobPayload, QueueJobRow};

/// Priority decay per retry: failing jobs drift toward the back of the
/// line without starving.
const RETRY_PRIORITY_DECAY: i32 = 20;

/// What an enqueue call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// New row inserted as pending.
    Created,
    /// Terminal or stale row reset to pending.
    Reset,
    /// A pending or actively processing job already covers this key.
    AlreadyQueued,
}

/// Queue counts for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub dead_letter: i64,
    pub avg_processing_seconds: f64,
}

#[derive(Clone)]
pub struct QueueRepository {
    pool: PgPool,
}

impl QueueRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue a typed job, deduplicating on `source_url`.
    ///
    /// `stale_threshold_minutes` governs when a `processing` row may be
    /// stolen back to pending.
    pub async fn enqueue(
        &self,
        source_url: &str,
        payload: &JobPayload,
        meeting_id: Option<&str>,
        banana: Option<&str>,
        priority: i32,
        stale_threshold_minutes: i64,
    ) -> Result<EnqueueOutcome> {
        let inserted: Option<bool> = sqlx::query_scalar(
            r#"
            INSERT INTO queue (source_url, meeting_id, banana, job_type, payload,
                               status, priority, retry_count)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, 0)
            ON CONFLICT (source_url) DO UPDATE SET
                status = 'pending',
                job_type = EXCLUDED.job_type,
                payload = EXCLUDED.payload,
                priority = EXCLUDED.priority,
                retry_count = CASE WHEN queue.status = 'processing'
                                   THEN queue.retry_count + 1 ELSE 0 END,
                error_message = NULL,
                started_at = NULL,
                completed_at = NULL,
                failed_at = NULL
            WHERE queue.status IN ('completed', 'failed', 'dead_letter')
               OR (queue.status = 'processing'
                   AND queue.started_at < NOW() - make_interval(mins => $7::int))
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(source_url)
        .bind(meeting_id)
        .bind(banana)
        .bind(payload.job_type())
        .bind(Json(payload.to_value()))
        .bind(priority)
        .bind(stale_threshold_minutes as i32)
        .fetch_optional(&self.pool)
        .await?;

        let outcome = match inserted {
            Some(true) => EnqueueOutcome::Created,
            Some(false) => EnqueueOutcome::Reset,
            None => EnqueueOutcome::AlreadyQueued,
        };

        debug!(source_url, job_type = payload.job_type(), ?outcome, "enqueue");
        Ok(outcome)
    }

    /// Atomically claim the next pending job: strict priority-desc,
    /// created_at-asc, optionally sharded by city.
    pub async fn next_for_processing(&self, banana: Option<&str>) -> Result<Option<QueueJobRow>> {
        let job = sqlx::query_as::<_, QueueJobRow>(
            r#"
            UPDATE queue
            SET status = 'processing', started_at = NOW()
            WHERE id = (
                SELECT id FROM queue
                WHERE status = 'pending'
                  AND ($1::text IS NULL OR banana = $1)
                ORDER BY priority DESC, created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(banana)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    pub async fn mark_complete(&self, queue_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE queue SET status = 'completed', completed_at = NOW() WHERE id = $1",
        )
        .bind(queue_id)
        .execute(&self.pool)
        .await?;

        debug!(queue_id, "job completed");
        Ok(())
    }

    /// Mark a job failed.
    ///
    /// Retryable failures re-enter pending with decayed priority until the
    /// retry cap, then dead-letter. Non-retryable failures (malformed
    /// payloads, missing meetings) go straight to `failed`.
    pub async fn mark_failed(
        &self,
        queue_id: i64,
        error_message: &str,
        retryable: bool,
        retry_cap: i32,
    ) -> Result<()> {
        if !retryable {
            sqlx::query(
                r#"
                UPDATE queue
                SET status = 'failed', error_message = $2, failed_at = NOW(), completed_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(queue_id)
            .bind(error_message)
            .execute(&self.pool)
            .await?;

            warn!(queue_id, error = error_message, "job failed (non-retryable)");
            return Ok(());
        }

        let Some((retry_count, priority)) = sqlx::query_as::<_, (i32, i32)>(
            "SELECT retry_count, priority FROM queue WHERE id = $1",
        )
        .bind(queue_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            error!(queue_id, "queue row vanished while marking failed");
            return Ok(());
        };

        if retry_count + 1 < retry_cap {
            let new_priority = priority - RETRY_PRIORITY_DECAY * (retry_count + 1);
            sqlx::query(
                r#"
                UPDATE queue
                SET status = 'pending',
                    priority = $2,
                    retry_count = retry_count + 1,
                    error_message = $3,
                    started_at = NULL,
                    completed_at = NULL,
                    failed_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(queue_id)
            .bind(new_priority)
            .bind(error_message)
            .execute(&self.pool)
            .await?;

            warn!(
                queue_id,
                attempt = retry_count + 1,
                retry_cap,
                new_priority,
                error = error_message,
                "job retry scheduled"
            );
        } else {
            sqlx::query(
                r#"
                UPDATE queue
                SET status = 'dead_letter',
                    retry_count = retry_count + 1,
                    error_message = $2,
                    failed_at = NOW(),
                    completed_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(queue_id)
            .bind(error_message)
            .execute(&self.pool)
            .await?;

            error!(
                queue_id,
                failures = retry_count + 1,
                error = error_message,
                "job moved to dead letter queue"
            );
        }

        Ok(())
    }

    /// Rescue jobs whose worker died mid-processing: anything in
    /// `processing` older than the threshold returns to pending with its
    /// retry counted and `started_at` cleared.
    pub async fn recover_stale(&self, stale_threshold_minutes: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE queue
            SET status = 'pending',
                retry_count = retry_count + 1,
                started_at = NULL,
                error_message = 'auto-recovered from stale processing state'
            WHERE status = 'processing'
              AND started_at < NOW() - make_interval(mins => $1::int)
            "#,
        )
        .bind(stale_threshold_minutes as i32)
        .execute(&self.pool)
        .await?;

        let recovered = result.rows_affected();
        if recovered > 0 {
            info!(recovered, "stale jobs recovered");
        }
        Ok(recovered)
    }

    /// Dead-letter rows, newest first, for diagnostics.
    pub async fn dead_letters(&self, limit: i64) -> Result<Vec<QueueJobRow>> {
        let jobs = sqlx::query_as::<_, QueueJobRow>(
            "SELECT * FROM queue WHERE status = 'dead_letter' ORDER BY failed_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status::text, COUNT(*) FROM queue GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = QueueStats::default();
        for (status, count) in rows {
            match status.as_str() {
                "pending" => stats.pending = count,
                "processing" => stats.processing = count,
                "completed" => stats.completed = count,
                "failed" => stats.failed = count,
                "dead_letter" => stats.dead_letter = count,
                _ => {}
            }
        }

        let avg: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT AVG(EXTRACT(EPOCH FROM (completed_at - started_at)))::float8
            FROM queue
            WHERE status = 'completed' AND completed_at IS NOT NULL AND started_at IS NOT NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        stats.avg_processing_seconds = avg.unwrap_or(0.0);

        Ok(stats)
    }
}
