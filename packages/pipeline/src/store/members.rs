//! Council member repository: members, sponsorships, votes.
//!
//! Members are deduplicated by normalized name within a city. Sponsorship
//! links and vote records are idempotent so re-ingesting a meeting never
//! double-counts.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use crate::error::Result;
use crate::models::{records::VoteRecord, CouncilMember};

#[derive(Clone)]
pub struct MemberRepository {
    pool: PgPool,
}

impl MemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, banana: &str, name: &str) -> Result<Option<CouncilMember>> {
        let member = sqlx::query_as::<_, CouncilMember>(
            "SELECT * FROM council_members WHERE banana = $1 AND normalized_name = $2",
        )
        .bind(banana)
        .bind(normalize_member_name(name))
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    /// Upsert a member by normalized name and return the row id.
    pub async fn upsert(
        &self,
        banana: &str,
        name: &str,
        conn: &mut PgConnection,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO council_members (banana, name, normalized_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (banana, normalized_name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(banana)
        .bind(name.trim())
        .bind(normalize_member_name(name))
        .fetch_one(conn)
        .await?;
        Ok(id)
    }

    /// Link sponsors to a matter, creating members as needed. Idempotent.
    pub async fn link_sponsors_to_matter(
        &self,
        banana: &str,
        matter_id: &str,
        sponsor_names: &[String],
        appeared_at: Option<DateTime<Utc>>,
        conn: &mut PgConnection,
    ) -> Result<usize> {
        let mut linked = 0;
        for name in sponsor_names {
            if name.trim().is_empty() {
                continue;
            }
            let member_id = self.upsert(banana, name, conn).await?;
            sqlx::query(
                r#"
                INSERT INTO sponsorships (member_id, matter_id, first_seen)
                VALUES ($1, $2, $3)
                ON CONFLICT (member_id, matter_id) DO NOTHING
                "#,
            )
            .bind(member_id)
            .bind(matter_id)
            .bind(appeared_at)
            .execute(&mut *conn)
            .await?;
            linked += 1;
        }

        debug!(matter_id, count = linked, "sponsors linked");
        Ok(linked)
    }

    /// Record votes for a matter at one meeting, keyed by
    /// `(member, matter, meeting)`. Re-ingest overwrites the vote value.
    pub async fn record_votes_for_matter(
        &self,
        banana: &str,
        matter_id: &str,
        meeting_id: &str,
        votes: &[VoteRecord],
        vote_date: Option<DateTime<Utc>>,
        conn: &mut PgConnection,
    ) -> Result<usize> {
        let mut recorded = 0;
        for vote in votes {
            if vote.name.trim().is_empty() {
                continue;
            }
            let member_id = self.upsert(banana, &vote.name, conn).await?;
            sqlx::query(
                r#"
                INSERT INTO votes (member_id, matter_id, meeting_id, vote, vote_date)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (member_id, matter_id, meeting_id) DO UPDATE SET
                    vote = EXCLUDED.vote,
                    vote_date = EXCLUDED.vote_date
                "#,
            )
            .bind(member_id)
            .bind(matter_id)
            .bind(meeting_id)
            .bind(vote.vote.trim().to_lowercase())
            .bind(vote_date)
            .execute(&mut *conn)
            .await?;
            recorded += 1;
        }
        Ok(recorded)
    }
}

/// Normalize a member name for deduplication: honorifics stripped,
/// lowercased, whitespace collapsed.
pub fn normalize_member_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let without_title = lowered
        .strip_prefix("councilmember ")
        .or_else(|| lowered.strip_prefix("council member "))
        .or_else(|| lowered.strip_prefix("mayor "))
        .or_else(|| lowered.strip_prefix("vice mayor "))
        .unwrap_or(&lowered);
    without_title.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_honorifics() {
        assert_eq!(normalize_member_name("Councilmember Jane Smith"), "jane smith");
        assert_eq!(normalize_member_name("Mayor  Pat  Burt"), "pat burt");
        assert_eq!(normalize_member_name("Vice Mayor Lee"), "lee");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_member_name("Council Member Jane Smith");
        let twice = normalize_member_name(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(normalize_member_name("  Jane   Smith "), "jane smith");
    }
}
