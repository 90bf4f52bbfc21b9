//! Last-write-wins projection of status events, used for fast polling.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::errors::ApiError;
use crate::status::event::StatusEvent;

/// The most recently observed status for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub id: String,
    pub status: String,
    pub desc: Option<String>,
}

/// SQLite-backed key-value cache. Writes are idempotent: replaying the
/// same event leaves the cache observably unchanged.
#[derive(Clone)]
pub struct StatusCache {
    pool: SqlitePool,
}

impl StatusCache {
    /// In-memory cache, the default for the serving process.
    pub async fn in_memory() -> Result<Self, ApiError> {
        // A single pooled connection held for the process lifetime: each
        // SQLite in-memory connection is its own database, so a recycled
        // connection would come back empty.
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .max_lifetime(None)
            .idle_timeout(None)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let cache = Self { pool };
        cache.init_schema().await?;
        Ok(cache)
    }

    /// File-backed cache, for deployments that want the projection to
    /// survive a restart.
    pub async fn with_path(db_path: &Path) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let cache = Self { pool };
        cache.init_schema().await?;
        Ok(cache)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv_store (
                id TEXT PRIMARY KEY,
                status VARCHAR(10) NOT NULL,
                desc TEXT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;
        Ok(())
    }

    /// Upsert the latest status for a document (last write wins).
    pub async fn set(&self, id: &str, status: &str, desc: Option<&str>) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO kv_store (id, status, desc)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 desc = excluded.desc",
        )
        .bind(id)
        .bind(status)
        .bind(desc)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;
        Ok(())
    }

    /// Apply one status event. Safe under redelivery.
    pub async fn apply(&self, event: &StatusEvent) -> Result<(), ApiError> {
        self.set(&event.doc_id, event.status.as_str(), event.reason.as_deref())
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<StatusEntry>, ApiError> {
        let row = sqlx::query("SELECT id, status, desc FROM kv_store WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(row.map(|row| StatusEntry {
            id: row.get("id"),
            status: row.get("status"),
            desc: row.get("desc"),
        }))
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM kv_store WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(())
    }

    pub async fn all(&self) -> Result<Vec<StatusEntry>, ApiError> {
        let rows = sqlx::query("SELECT id, status, desc FROM kv_store")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(rows
            .iter()
            .map(|row| StatusEntry {
                id: row.get("id"),
                status: row.get("status"),
                desc: row.get("desc"),
            })
            .collect())
    }
}
