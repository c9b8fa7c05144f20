//! Key-value store on top of the `kv_store` table.

use async_trait::async_trait;
use sqlx::Row;

use super::Pool;
use crate::kv::{KeyValueStore, StorageError};

/// Durable store backed by SQLite.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    /// Wrap a pool whose schema has already been migrated.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Connect, migrate and wrap in one step.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = super::create_pool(database_url).await?;
        super::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query(r#"SELECT value FROM kv_store WHERE key = ?1"#)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => Some(row.try_get("value")?),
            None => None,
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value)
            VALUES (?1, ?2)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query(r#"DELETE FROM kv_store WHERE key = ?1"#)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let keys: Vec<(String,)> = sqlx::query_as(r#"SELECT key FROM kv_store ORDER BY key"#)
            .fetch_all(&self.pool)
            .await?;

        Ok(keys.into_iter().map(|(key,)| key).collect())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        for key in keys {
            sqlx::query(r#"DELETE FROM kv_store WHERE key = ?1"#)
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }
}
