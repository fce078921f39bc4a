//! Sync coordinator between the entity store and its persistence backend.
//!
//! Outbound writes are debounced: every qualifying change restarts one timer
//! and only the state at expiry is written. Inbound shared snapshots are
//! applied with `applying_remote` raised, and the write trigger ignores every
//! change made while it is raised, so applying a snapshot never echoes it back.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

use crate::errors::AppError;
use crate::models::{ExtractedEntities, LocalSnapshot, Update, UpdatePatch};
use crate::persistence::{LocalSnapshotStore, SharedSnapshotStore, Subscription};
use crate::store::EntityStore;

/// Lifecycle of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Which persistence contract the session writes through.
#[derive(Clone)]
pub enum Backend {
    Local(Arc<dyn LocalSnapshotStore>),
    Shared(Arc<dyn SharedSnapshotStore>),
}

impl Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Local(_) => "local",
            Backend::Shared(_) => "shared",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    /// The update collection itself
    Collection,
    /// Only the active id or the admin flag
    Session,
}

/// Point-in-time copy of the session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SyncState,
    pub updates: Arc<Vec<Update>>,
    pub active_update_id: Option<String>,
    pub is_admin: bool,
    pub revision: i64,
}

struct Session {
    store: EntityStore,
    is_admin: bool,
    state: SyncState,
    applying_remote: bool,
    seeded_default: bool,
    /// Local change counter, bumped on every visible change
    revision: i64,
    /// Last collection handed to the shared store, to recognize its echo
    last_published: Option<Vec<Update>>,
    pending_write: Option<JoinHandle<()>>,
}

struct Inner {
    session: Mutex<Session>,
    backend: Backend,
    debounce: Duration,
    subscription: Mutex<Option<Subscription>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.session.get_mut().pending_write.take() {
            handle.abort();
        }
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
    }
}

/// Owns the editing session and keeps it in sync with the backend.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    pub fn new(backend: Backend, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                session: Mutex::new(Session {
                    store: EntityStore::new(),
                    is_admin: false,
                    state: SyncState::Uninitialized,
                    applying_remote: false,
                    seeded_default: false,
                    revision: 0,
                    last_published: None,
                    pending_write: None,
                }),
                backend,
                debounce,
                subscription: Mutex::new(None),
                listener: Mutex::new(None),
            }),
        }
    }

    async fn session(&self) -> MutexGuard<'_, Session> {
        self.inner.session.lock().await
    }

    /// Load or subscribe to the first snapshot. Runs once; later calls are no-ops.
    pub async fn initialize(&self) {
        {
            let mut session = self.session().await;
            if session.state != SyncState::Uninitialized {
                return;
            }
            session.state = SyncState::Initializing;
        }

        tracing::info!(backend = self.inner.backend.name(), "Initializing session");

        match &self.inner.backend {
            Backend::Local(store) => {
                let loaded = match store.load_snapshot().await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        tracing::error!("Failed to load local snapshot, starting fresh: {}", e);
                        None
                    }
                };

                let mut session = self.session().await;
                match loaded {
                    Some(snapshot) if !snapshot.updates.is_empty() => {
                        session.store.replace_all(snapshot.updates);
                        session.store.select(&snapshot.active_update_id);
                        session.is_admin = snapshot.is_admin;
                        session.revision += 1;
                        session.state = SyncState::Ready;
                    }
                    _ => {
                        seed_default(&mut session);
                        session.state = SyncState::Ready;
                        self.schedule_write(&mut session);
                    }
                }
                tracing::info!(updates = session.store.len(), "Session ready");
            }
            Backend::Shared(store) => {
                let (tx, mut rx) = mpsc::unbounded_channel();
                match store.subscribe(tx).await {
                    Ok(subscription) => {
                        *self.inner.subscription.lock().await = Some(subscription);

                        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
                        let listener = tokio::spawn(async move {
                            while let Some(updates) = rx.recv().await {
                                let Some(inner) = weak.upgrade() else {
                                    break;
                                };
                                SyncCoordinator { inner }.apply_remote(updates).await;
                            }
                        });
                        *self.inner.listener.lock().await = Some(listener);
                    }
                    Err(e) => {
                        tracing::error!("Failed to subscribe to shared store: {}", e);
                        let mut session = self.session().await;
                        seed_default(&mut session);
                        session.state = SyncState::Ready;
                    }
                }
            }
        }
    }

    /// Apply an inbound shared snapshot.
    pub async fn apply_remote(&self, updates: Option<Vec<Update>>) {
        let mut session = self.session().await;
        let first = session.state != SyncState::Ready;

        let updates = match updates {
            Some(updates) if !updates.is_empty() => updates,
            _ => {
                if first {
                    seed_default(&mut session);
                    session.state = SyncState::Ready;
                    tracing::info!("Shared store is empty, starting from the default update");
                } else {
                    tracing::warn!("Ignoring empty shared snapshot");
                }
                return;
            }
        };

        if !first {
            if **session.store.updates() == updates {
                return;
            }
            if session.last_published.as_ref() == Some(&updates) {
                tracing::debug!("Skipping echo of our own publish");
                return;
            }
        }

        // Last writer wins: edits still waiting for the timer are replaced
        if let Some(handle) = session.pending_write.take() {
            tracing::debug!("Inbound snapshot cancels pending write");
            handle.abort();
        }

        // Another writer moved the hub past our publish, so a later snapshot
        // equal to it is a real revert and not our echo
        session.last_published = None;

        session.applying_remote = true;
        let changed = session.store.replace_all(updates);
        if session.store.active_update().is_none() {
            if first {
                if let Some(id) = session.store.updates().first().map(|u| u.id.clone()) {
                    session.store.select(&id);
                }
            } else {
                // The selected update was deleted remotely
                session.store.select("");
            }
        }
        if changed {
            self.on_change(&mut session, Change::Collection);
        }
        session.applying_remote = false;

        if first {
            session.state = SyncState::Ready;
            tracing::info!(updates = session.store.len(), "Session ready");
        } else {
            tracing::debug!(updates = session.store.len(), "Applied shared snapshot");
        }
    }

    /// Stop syncing: the pending write is dropped, not flushed, and the
    /// subscription is released.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.session().await.pending_write.take() {
            handle.abort();
            tracing::info!("Pending write discarded on shutdown");
        }
        if let Some(mut subscription) = self.inner.subscription.lock().await.take() {
            subscription.cancel();
        }
        if let Some(handle) = self.inner.listener.lock().await.take() {
            handle.abort();
        }
    }

    pub async fn state(&self) -> SyncState {
        self.session().await.state
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session().await;
        SessionSnapshot {
            state: session.state,
            updates: Arc::clone(session.store.updates()),
            active_update_id: session.store.active_update_id().map(str::to_string),
            is_admin: session.is_admin,
            revision: session.revision,
        }
    }

    pub async fn revision(&self) -> i64 {
        self.session().await.revision
    }

    pub async fn is_admin(&self) -> bool {
        self.session().await.is_admin
    }

    pub async fn active_update_id(&self) -> Option<String> {
        self.session()
            .await
            .store
            .active_update_id()
            .map(str::to_string)
    }

    pub async fn get_update(&self, id: &str) -> Option<Update> {
        self.session().await.store.get(id).cloned()
    }

    /// Whether a write is waiting for the debounce timer.
    pub async fn has_pending_write(&self) -> bool {
        self.session().await.pending_write.is_some()
    }

    /// Admin mode is part of the one session this process holds, so it
    /// applies to every client at once.
    pub async fn set_admin(&self, is_admin: bool) {
        let mut session = self.session().await;
        if session.is_admin == is_admin {
            return;
        }
        session.is_admin = is_admin;
        tracing::info!(is_admin, "Admin mode changed");
        self.on_change(&mut session, Change::Session);
    }

    /// Add a default-named update and make it active. Returns its id.
    pub async fn add_update(&self) -> Result<String, AppError> {
        let mut session = self.ready_session().await?;
        let id = session.store.next_update_id(Utc::now().timestamp_millis());
        let name = session.store.next_update_name();

        if session.store.add(Update::new(id.clone(), name)) {
            session.store.select(&id);
            self.on_change(&mut session, Change::Collection);
        }
        Ok(id)
    }

    /// Whole-field patch of one update.
    pub async fn patch_update(&self, id: &str, patch: &UpdatePatch) -> Result<Update, AppError> {
        let mut session = self.ready_session().await?;
        require_update(&session, id)?;

        if session.store.patch(id, patch) {
            self.on_change(&mut session, Change::Collection);
        }
        require_update(&session, id)
    }

    pub async fn rename_update(&self, id: &str, name: &str) -> Result<Update, AppError> {
        let mut session = self.ready_session().await?;
        require_update(&session, id)?;

        if session.store.rename(id, name) {
            self.on_change(&mut session, Change::Collection);
        }
        require_update(&session, id)
    }

    /// Remove an update. Returns false when it was the last one.
    pub async fn remove_update(&self, id: &str) -> Result<bool, AppError> {
        let mut session = self.ready_session().await?;
        require_update(&session, id)?;

        let removed = session.store.remove(id);
        if removed {
            self.on_change(&mut session, Change::Collection);
        }
        Ok(removed)
    }

    /// Select an update; unknown ids leave nothing active.
    pub async fn select_update(&self, id: &str) -> Result<Option<String>, AppError> {
        let mut session = self.ready_session().await?;
        if session.store.select(id) {
            self.on_change(&mut session, Change::Session);
        }
        Ok(session.store.active_update_id().map(str::to_string))
    }

    /// Append an extracted batch to one update in a single change.
    pub async fn append_extracted(
        &self,
        id: &str,
        batch: &ExtractedEntities,
    ) -> Result<(), AppError> {
        let mut session = self.ready_session().await?;
        require_update(&session, id)?;

        if session.store.append_extracted(id, batch) {
            self.on_change(&mut session, Change::Collection);
        }
        Ok(())
    }

    async fn ready_session(&self) -> Result<MutexGuard<'_, Session>, AppError> {
        let session = self.session().await;
        if session.state != SyncState::Ready {
            return Err(AppError::Validation(
                "Session is still initializing".to_string(),
            ));
        }
        Ok(session)
    }

    /// Bump the revision and restart the write timer when the change should
    /// reach the backend.
    fn on_change(&self, session: &mut Session, change: Change) {
        session.revision += 1;

        if session.applying_remote {
            return;
        }
        if session.state != SyncState::Ready {
            return;
        }

        let should_write = match &self.inner.backend {
            Backend::Local(_) => true,
            Backend::Shared(_) => change == Change::Collection && session.is_admin,
        };
        if should_write {
            self.schedule_write(session);
        }
    }

    fn schedule_write(&self, session: &mut Session) {
        if let Some(handle) = session.pending_write.take() {
            handle.abort();
        }

        let weak = Arc::downgrade(&self.inner);
        let delay = self.inner.debounce;
        session.pending_write = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                SyncCoordinator { inner }.flush().await;
            }
        }));
        tracing::debug!(delay_ms = delay.as_millis() as u64, "Write scheduled");
    }

    async fn flush(&self) {
        let write = {
            let mut session = self.session().await;
            // Detach rather than abort: a new edit must not cancel this write
            session.pending_write = None;
            if session.state != SyncState::Ready {
                return;
            }

            match &self.inner.backend {
                Backend::Local(_) => Outbound::Local(LocalSnapshot {
                    updates: Vec::clone(session.store.updates()),
                    active_update_id: session
                        .store
                        .active_update_id()
                        .unwrap_or_default()
                        .to_string(),
                    is_admin: session.is_admin,
                }),
                Backend::Shared(_) => {
                    if !session.is_admin {
                        return;
                    }
                    let updates = Vec::clone(session.store.updates());
                    session.last_published = Some(updates.clone());
                    Outbound::Shared(updates)
                }
            }
        };

        match (&self.inner.backend, write) {
            (Backend::Local(store), Outbound::Local(snapshot)) => {
                if let Err(e) = store.save_snapshot(&snapshot).await {
                    tracing::error!("Failed to save local snapshot: {}", e);
                }
            }
            (Backend::Shared(store), Outbound::Shared(updates)) => {
                match store.publish(&updates).await {
                    Ok(()) => tracing::debug!(updates = updates.len(), "Published snapshot"),
                    Err(e) => tracing::error!("Failed to publish snapshot: {}", e),
                }
            }
            _ => {}
        }
    }
}

enum Outbound {
    Local(LocalSnapshot),
    Shared(Vec<Update>),
}

fn seed_default(session: &mut Session) {
    if session.seeded_default {
        return;
    }
    session.seeded_default = true;
    session.store.replace_all(vec![Update::initial()]);
    session.store.select(crate::models::DEFAULT_UPDATE_ID);
    session.revision += 1;
}

fn require_update(session: &Session, id: &str) -> Result<Update, AppError> {
    session
        .store
        .get(id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Update {} not found", id)))
}
