//! The shared snapshot hub hosted by this process.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use super::{SharedSnapshotStore, SnapshotSender, Subscription};
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{RevisionInfo, Update};

/// Shared update collection with revision-based change notification.
#[derive(Clone)]
pub struct SharedHub {
    repo: Arc<Repository>,
    revision_tx: Arc<watch::Sender<i64>>,
}

impl SharedHub {
    pub async fn open(repo: Arc<Repository>) -> Result<Self, AppError> {
        let revision = repo.get_revision_id().await?;
        let (revision_tx, _) = watch::channel(revision);

        Ok(Self {
            repo,
            revision_tx: Arc::new(revision_tx),
        })
    }

    /// Current collection (`None` until first written) and its revision.
    pub async fn snapshot(&self) -> Result<(Option<Vec<Update>>, i64), AppError> {
        self.repo.get_shared_updates().await
    }

    pub async fn revision_info(&self) -> Result<RevisionInfo, AppError> {
        self.repo.get_revision_info().await
    }

    /// Overwrite the collection and wake every watcher.
    pub async fn write(&self, updates: &[Update]) -> Result<i64, AppError> {
        let revision = self.repo.put_shared_updates(updates).await?;

        // Concurrent writers may finish out of order; only move forward
        self.revision_tx.send_if_modified(|current| {
            if revision > *current {
                *current = revision;
                true
            } else {
                false
            }
        });

        tracing::debug!(revision, updates = updates.len(), "Shared snapshot written");
        Ok(revision)
    }

    pub fn watch(&self) -> watch::Receiver<i64> {
        self.revision_tx.subscribe()
    }
}

/// `SharedSnapshotStore` over a hub in the same process.
#[derive(Clone)]
pub struct HubSharedStore {
    hub: SharedHub,
}

impl HubSharedStore {
    pub fn new(hub: SharedHub) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl SharedSnapshotStore for HubSharedStore {
    async fn subscribe(&self, tx: SnapshotSender) -> Result<Subscription, AppError> {
        let hub = self.hub.clone();
        let mut revisions = hub.watch();

        let handle = tokio::spawn(async move {
            let mut delivered = false;
            loop {
                // Mark seen before reading so a write during the read wakes us again
                revisions.borrow_and_update();

                let updates = match hub.snapshot().await {
                    Ok((updates, _)) => Some(updates),
                    Err(e) => {
                        tracing::warn!("Failed to read shared snapshot: {}", e);
                        // An unreadable first read counts as an empty hub
                        (!delivered).then_some(None)
                    }
                };

                if let Some(updates) = updates {
                    delivered = true;
                    if tx.send(updates).is_err() {
                        break;
                    }
                }

                if revisions.changed().await.is_err() {
                    break;
                }
            }
        });

        Ok(Subscription::new(handle))
    }

    async fn publish(&self, updates: &[Update]) -> Result<(), AppError> {
        self.hub.write(updates).await.map(|_| ())
    }
}
