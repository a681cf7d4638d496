//! PostgreSQL state manager

use super::{NodesHealth, NodesHealthStore};
use crate::chain::Blockchain;
use crate::config::DatabaseConfig;
use crate::error::{StoreError, StoreResult};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info};

/// State manager for PostgreSQL persistence
pub struct StateManager {
    pool: PgPool,
}

impl StateManager {
    /// Create a new state manager
    pub async fn new(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS nodes_health (
                blockchain_id BIGINT PRIMARY KEY,
                unhealthy_total INTEGER NOT NULL,
                unhealthy_endpoints TEXT NOT NULL,
                healthy_total INTEGER NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations complete");
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl NodesHealthStore for StateManager {
    async fn read_nodes_health(&self, blockchain: Blockchain) -> StoreResult<Option<NodesHealth>> {
        let row = sqlx::query(
            r#"
            SELECT blockchain_id, unhealthy_total, unhealthy_endpoints, healthy_total, updated_at
            FROM nodes_health
            WHERE blockchain_id = $1
            "#,
        )
        .bind(blockchain.id() as i64)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let blockchain_id: i64 = row.get("blockchain_id");
        let blockchain = u32::try_from(blockchain_id)
            .ok()
            .and_then(Blockchain::from_id)
            .ok_or(StoreError::UnknownBlockchain(blockchain_id))?;
        let unhealthy_endpoints: String = row.get("unhealthy_endpoints");
        let updated_at: DateTime<Utc> = row.get("updated_at");
        debug!(%blockchain, %updated_at, "Read node health");

        Ok(Some(NodesHealth {
            blockchain,
            unhealthy_total: row.get::<i32, _>("unhealthy_total") as u32,
            unhealthy_endpoints: serde_json::from_str(&unhealthy_endpoints)?,
            healthy_total: row.get::<i32, _>("healthy_total") as u32,
        }))
    }

    async fn upsert_nodes_health(&self, record: &NodesHealth) -> StoreResult<()> {
        let unhealthy_endpoints = serde_json::to_string(&record.unhealthy_endpoints)?;

        sqlx::query(
            r#"
            INSERT INTO nodes_health
                (blockchain_id, unhealthy_total, unhealthy_endpoints, healthy_total, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (blockchain_id)
            DO UPDATE SET unhealthy_total = $2, unhealthy_endpoints = $3,
                          healthy_total = $4, updated_at = $5
            "#,
        )
        .bind(record.blockchain.id() as i64)
        .bind(record.unhealthy_total as i32)
        .bind(&unhealthy_endpoints)
        .bind(record.healthy_total as i32)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(
            blockchain = %record.blockchain,
            unhealthy = record.unhealthy_total,
            healthy = record.healthy_total,
            "Saved node health"
        );
        Ok(())
    }
}
