//! SQLite-backed local snapshot store.

use std::sync::Arc;

use async_trait::async_trait;

use super::LocalSnapshotStore;
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::LocalSnapshot;

/// Key the session snapshot is stored under.
pub const STORAGE_KEY: &str = "als_update_wiki_v1";

/// Keeps the session snapshot as one JSON blob in the key-value table.
#[derive(Clone)]
pub struct SqliteLocalStore {
    repo: Arc<Repository>,
    key: String,
}

impl SqliteLocalStore {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self::with_key(repo, STORAGE_KEY)
    }

    pub fn with_key(repo: Arc<Repository>, key: impl Into<String>) -> Self {
        Self {
            repo,
            key: key.into(),
        }
    }
}

#[async_trait]
impl LocalSnapshotStore for SqliteLocalStore {
    async fn load_snapshot(&self) -> Result<Option<LocalSnapshot>, AppError> {
        let Some(raw) = self.repo.get_value(&self.key).await? else {
            return Ok(None);
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| AppError::Storage(format!("Local snapshot is corrupt: {}", e)))
    }

    async fn save_snapshot(&self, snapshot: &LocalSnapshot) -> Result<(), AppError> {
        let raw = serde_json::to_string(snapshot)
            .map_err(|e| AppError::Storage(format!("Failed to encode local snapshot: {}", e)))?;
        self.repo.put_value(&self.key, &raw).await
    }
}
