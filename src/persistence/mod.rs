//! Persistence adapters for the editing session.
//!
//! Two interchangeable contracts: a local store that loads and saves the whole
//! session snapshot, and a shared store that publishes the update collection
//! and streams every change back to subscribers.

mod hub;
mod local;
mod remote;

pub use hub::*;
pub use local::*;
pub use remote::*;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::errors::AppError;
use crate::models::{LocalSnapshot, Update};

/// Receives every shared snapshot; `None` means the store was never written.
pub type SnapshotSender = mpsc::UnboundedSender<Option<Vec<Update>>>;

/// Durable key-value persistence of the full session snapshot.
#[async_trait]
pub trait LocalSnapshotStore: Send + Sync {
    async fn load_snapshot(&self) -> Result<Option<LocalSnapshot>, AppError>;
    async fn save_snapshot(&self, snapshot: &LocalSnapshot) -> Result<(), AppError>;
}

/// Shared publish/subscribe persistence of the update collection.
#[async_trait]
pub trait SharedSnapshotStore: Send + Sync {
    /// Start delivering snapshots to `tx`, beginning with the current one.
    async fn subscribe(&self, tx: SnapshotSender) -> Result<Subscription, AppError>;
    async fn publish(&self, updates: &[Update]) -> Result<(), AppError>;
}

/// A live snapshot feed. Dropping it stops delivery.
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Stop delivery now.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
