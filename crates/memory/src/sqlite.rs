//! SQLite memory backend.
//!
//! One `memories` table keyed by a text id, indexed by owner and type.
//! `created_at` is nullable: imported records without a timestamp keep it
//! empty and are never decayed. Metadata is stored as a JSON object.

use async_trait::async_trait;
use aru_core::error::MemoryError;
use aru_core::memory::{MemoryBackend, MemoryRecord, MemoryType};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open (creating if needed) the database at `url`.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database.
    pub async fn new(url: &str) -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let backend = Self { pool };
        backend.run_migrations().await?;
        info!("SQLite memory backend initialized at {url}");
        Ok(backend)
    }

    /// Wrap an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, MemoryError> {
        let backend = Self { pool };
        backend.run_migrations().await?;
        Ok(backend)
    }

    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memories (
                id           TEXT PRIMARY KEY NOT NULL,
                user_id      TEXT NOT NULL,
                memory_type  TEXT NOT NULL,
                content      TEXT NOT NULL,
                created_at   TEXT,
                metadata     TEXT NOT NULL DEFAULT '{}',
                seq          INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("memories table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_memories_user_type ON memories(user_id, memory_type)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("user index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<MemoryRecord, MemoryError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| MemoryError::QueryFailed(format!("id column: {e}")))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| MemoryError::QueryFailed(format!("user_id column: {e}")))?;
        let memory_type: String = row
            .try_get("memory_type")
            .map_err(|e| MemoryError::QueryFailed(format!("memory_type column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| MemoryError::QueryFailed(format!("content column: {e}")))?;
        let created_at: Option<String> = row
            .try_get("created_at")
            .map_err(|e| MemoryError::QueryFailed(format!("created_at column: {e}")))?;
        let metadata_json: String = row
            .try_get("metadata")
            .map_err(|e| MemoryError::QueryFailed(format!("metadata column: {e}")))?;

        let created_at = created_at.and_then(|s| match chrono::DateTime::parse_from_rfc3339(&s) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(e) => {
                warn!(id = %id, error = %e, "Unparseable created_at, treating as undated");
                None
            }
        });

        Ok(MemoryRecord {
            memory_type: memory_type.parse::<MemoryType>()?,
            metadata: parse_metadata(&id, &metadata_json),
            id,
            content,
            user_id,
            created_at,
            score: 0.0,
        })
    }

    fn metadata_json(metadata: &serde_json::Map<String, serde_json::Value>) -> Result<String, MemoryError> {
        serde_json::to_string(metadata)
            .map_err(|e| MemoryError::Storage(format!("Metadata serialization: {e}")))
    }
}

/// Decode a stored metadata column; corrupt JSON yields an empty map.
fn parse_metadata(id: &str, json: &str) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::from_str(json) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(id = %id, error = %e, "Unparseable metadata, dropping it");
            serde_json::Map::new()
        }
    }
}

#[async_trait]
impl MemoryBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn add(&self, mut record: MemoryRecord) -> Result<String, MemoryError> {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        let metadata = Self::metadata_json(&record.metadata)?;
        let created_at = record.created_at.map(|t| t.to_rfc3339());

        sqlx::query(
            r#"
            INSERT INTO memories (id, user_id, memory_type, content, created_at, metadata, seq)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, (SELECT COALESCE(MAX(seq), 0) + 1 FROM memories))
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                memory_type = excluded.memory_type,
                content = excluded.content,
                created_at = excluded.created_at,
                metadata = excluded.metadata
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(record.memory_type.as_str())
        .bind(&record.content)
        .bind(&created_at)
        .bind(&metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT failed: {e}")))?;

        debug!(id = %record.id, "Stored memory");
        Ok(record.id)
    }

    async fn list(&self, user_id: &str, memory_type: Option<MemoryType>) -> Result<Vec<MemoryRecord>, MemoryError> {
        let rows = match memory_type {
            Some(t) => {
                sqlx::query("SELECT * FROM memories WHERE user_id = ?1 AND memory_type = ?2 ORDER BY seq")
                    .bind(user_id)
                    .bind(t.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM memories WHERE user_id = ?1 ORDER BY seq")
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| MemoryError::QueryFailed(format!("list: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>, MemoryError> {
        let row = sqlx::query("SELECT * FROM memories WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("get: {e}")))?;
        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn update(
        &self,
        id: &str,
        content: &str,
        metadata: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<bool, MemoryError> {
        let Some(existing) = self.get(id).await? else {
            return Ok(false);
        };
        let mut merged = existing.metadata;
        if let Some(metadata) = metadata {
            merged.extend(metadata);
        }
        let result = sqlx::query("UPDATE memories SET content = ?1, metadata = ?2 WHERE id = ?3")
            .bind(content)
            .bind(Self::metadata_json(&merged)?)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("UPDATE failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        let result = sqlx::query("DELETE FROM memories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("DELETE failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, user_id: &str) -> Result<usize, MemoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM memories WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("count: {e}")))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| MemoryError::QueryFailed(format!("count column: {e}")))?;
        Ok(n as usize)
    }

    async fn clear(&self, user_id: &str) -> Result<(), MemoryError> {
        sqlx::query("DELETE FROM memories WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("clear: {e}")))?;
        Ok(())
    }
}
