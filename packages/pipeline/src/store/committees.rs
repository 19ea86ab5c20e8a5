//! Committee repository.
//!
//! Meetings are linked to committees by matching the part of the meeting
//! title before a "-" separator against committee display names.

use sqlx::PgPool;

use crate::error::Result;
use crate::models::Committee;

#[derive(Clone)]
pub struct CommitteeRepository {
    pool: PgPool,
}

impl CommitteeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_name(&self, banana: &str, name: &str) -> Result<Option<Committee>> {
        let committee = sqlx::query_as::<_, Committee>(
            "SELECT * FROM committees WHERE banana = $1 AND LOWER(name) = LOWER($2)",
        )
        .bind(banana)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(committee)
    }

    pub async fn insert(&self, committee: &Committee) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO committees (id, banana, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (banana, name) DO NOTHING
            "#,
        )
        .bind(&committee.id)
        .bind(&committee.banana)
        .bind(&committee.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
