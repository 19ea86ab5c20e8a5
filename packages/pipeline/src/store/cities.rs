//! City repository. Cities are created by operators; the pipeline only
//! reads them.

use sqlx::PgPool;

use crate::error::Result;
use crate::models::City;

#[derive(Clone)]
pub struct CityRepository {
    pool: PgPool,
}

impl CityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, banana: &str) -> Result<Option<City>> {
        let city = sqlx::query_as::<_, City>("SELECT * FROM cities WHERE banana = $1")
            .bind(banana)
            .fetch_optional(&self.pool)
            .await?;
        Ok(city)
    }

    pub async fn active(&self) -> Result<Vec<City>> {
        let cities = sqlx::query_as::<_, City>(
            "SELECT * FROM cities WHERE status = 'active' ORDER BY banana",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(cities)
    }

    /// Operator-facing insert; used by tests and seeding, not the pipeline.
    pub async fn insert(&self, city: &City) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cities (banana, name, state, vendor, slug, county, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (banana) DO UPDATE SET
                name = EXCLUDED.name,
                state = EXCLUDED.state,
                vendor = EXCLUDED.vendor,
                slug = EXCLUDED.slug,
                county = EXCLUDED.county,
                status = EXCLUDED.status,
                updated_at = NOW()
            "#,
        )
        .bind(&city.banana)
        .bind(&city.name)
        .bind(&city.state)
        .bind(&city.vendor)
        .bind(&city.slug)
        .bind(&city.county)
        .bind(&city.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
