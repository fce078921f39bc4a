//! Database repository for snapshot storage.
//!
//! Snapshots are stored whole; there is no row-per-entity layout.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{RevisionInfo, Update};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== KEY-VALUE OPERATIONS ====================

    /// Read a raw value by key.
    pub async fn get_value(&self, key: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("value")))
    }

    /// Insert or overwrite a raw value.
    pub async fn put_value(&self, key: &str, value: &str) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== SHARED SNAPSHOT OPERATIONS ====================

    /// Get the current shared revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM shared_snapshot WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get shared revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM shared_snapshot WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }

    /// Get the shared update collection and its revision. `None` until first written.
    pub async fn get_shared_updates(&self) -> Result<(Option<Vec<Update>>, i64), AppError> {
        let row = sqlx::query("SELECT revision_id, payload FROM shared_snapshot WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;

        let revision_id: i64 = row.get("revision_id");
        let payload: Option<String> = row.get("payload");

        let updates = match payload {
            Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
                AppError::Storage(format!("Shared snapshot is corrupt: {}", e))
            })?),
            None => None,
        };

        Ok((updates, revision_id))
    }

    /// Overwrite the shared update collection and return the new revision.
    pub async fn put_shared_updates(&self, updates: &[Update]) -> Result<i64, AppError> {
        let payload = serde_json::to_string(updates)
            .map_err(|e| AppError::Internal(format!("Failed to encode snapshot: {}", e)))?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE shared_snapshot SET payload = ?, revision_id = revision_id + 1, generated_at = ? WHERE id = 1",
        )
        .bind(&payload)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query("SELECT revision_id FROM shared_snapshot WHERE id = 1")
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(row.get("revision_id"))
    }
}
