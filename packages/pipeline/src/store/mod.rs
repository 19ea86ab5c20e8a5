//! The content store: a connection pool plus one repository per entity.
//!
//! All multi-table writes (meeting + items + matters + appearances) run in
//! a single transaction owned by the caller; repository write methods take
//! `&mut PgConnection` so they compose inside it. Reads go straight to the
//! pool.

pub mod cities;
pub mod committees;
pub mod items;
pub mod matters;
pub mod meetings;
pub mod members;
pub mod queue;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::info;

use crate::config::Config;
use crate::error::Result;

pub use cities::CityRepository;
pub use committees::CommitteeRepository;
pub use items::ItemRepository;
pub use matters::MatterRepository;
pub use meetings::MeetingRepository;
pub use members::MemberRepository;
pub use queue::{EnqueueOutcome, QueueRepository, QueueStats};

/// Repository facade over the Postgres content store.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
    pub cities: CityRepository,
    pub committees: CommitteeRepository,
    pub meetings: MeetingRepository,
    pub items: ItemRepository,
    pub matters: MatterRepository,
    pub members: MemberRepository,
    pub queue: QueueRepository,
}

impl Store {
    /// Connect using pool bounds from config and run migrations.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.db_pool_min)
            .max_connections(config.db_pool_max)
            .connect(&config.database_url)
            .await?;

        info!(
            min = config.db_pool_min,
            max = config.db_pool_max,
            "connection pool created"
        );

        Self::from_pool(pool).await
    }

    /// Build the store from an existing pool (tests, embedding callers).
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            crate::error::PipelineError::Config(format!("migrations failed: {e}"))
        })?;

        Ok(Self {
            cities: CityRepository::new(pool.clone()),
            committees: CommitteeRepository::new(pool.clone()),
            meetings: MeetingRepository::new(pool.clone()),
            items: ItemRepository::new(pool.clone()),
            matters: MatterRepository::new(pool.clone()),
            members: MemberRepository::new(pool.clone()),
            queue: QueueRepository::new(pool.clone()),
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a transaction for a multi-table write.
    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>> {
        Ok(self.pool.begin().await?)
    }
}
