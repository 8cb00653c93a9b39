use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{config::Config, error::ApiError, storage::MetadataStore};

/// Metadata documents in a single `kv_entries` table, partitioned by
/// namespace.
pub struct PgMetadataStore {
    pool: PgPool,
    namespace: String,
}

impl PgMetadataStore {
    pub async fn connect(
        cfg: &Config,
        database_url: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.db_max_connections)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self::new(pool, cfg.metadata_namespace.clone()))
    }

    pub fn new(pool: PgPool, namespace: String) -> Self {
        Self { pool, namespace }
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn list_keys(&self) -> Result<Vec<String>, ApiError> {
        let keys = sqlx::query_scalar::<_, String>(
            "SELECT key FROM kv_entries WHERE namespace = $1 ORDER BY key",
        )
        .bind(&self.namespace)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM kv_entries WHERE namespace = $1 AND key = $2",
        )
        .bind(&self.namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO kv_entries (namespace, key, value) VALUES ($1, $2, $3) \
             ON CONFLICT (namespace, key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
        )
        .bind(&self.namespace)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM kv_entries WHERE namespace = $1 AND key = $2")
            .bind(&self.namespace)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
