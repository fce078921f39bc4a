//! Shared snapshot store backed by a hub on another host.
//!
//! Change detection polls the hub's revision endpoint and fetches the full
//! collection only when the revision moves.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{SharedSnapshotStore, SnapshotSender, Subscription};
use crate::auth::API_KEY_HEADER;
use crate::errors::AppError;
use crate::models::{RevisionInfo, Update};

const USER_AGENT: &str = concat!("als-wiki-backend/", env!("CARGO_PKG_VERSION"));

/// Success envelope returned by the hub.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    data: T,
    revision_id: i64,
}

/// HTTP client for a remote shared hub.
#[derive(Clone)]
pub struct HttpSharedStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    poll_interval: Duration,
}

impl HttpSharedStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        poll_interval: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            poll_interval,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch_revision(&self) -> Result<i64, AppError> {
        let response = self
            .client
            .get(self.url("/api/shared/revision"))
            .send()
            .await?
            .error_for_status()?;
        let envelope: Envelope<RevisionInfo> = response.json().await?;
        Ok(envelope.data.revision_id)
    }

    async fn fetch_snapshot(&self) -> Result<(Option<Vec<Update>>, i64), AppError> {
        let response = self
            .client
            .get(self.url("/api/shared/snapshot"))
            .send()
            .await?
            .error_for_status()?;
        let envelope: Envelope<Option<Vec<Update>>> = response.json().await?;
        Ok((envelope.data, envelope.revision_id))
    }
}

#[async_trait]
impl SharedSnapshotStore for HttpSharedStore {
    async fn subscribe(&self, tx: SnapshotSender) -> Result<Subscription, AppError> {
        let store = self.clone();

        let handle = tokio::spawn(async move {
            let mut seen: Option<i64> = None;
            let mut delivered = false;
            loop {
                let mut failed = false;
                let moved = match store.fetch_revision().await {
                    Ok(revision) => seen != Some(revision),
                    Err(e) => {
                        tracing::warn!("Failed to poll shared revision: {}", e);
                        failed = true;
                        false
                    }
                };

                if moved {
                    match store.fetch_snapshot().await {
                        Ok((updates, revision)) => {
                            seen = Some(revision);
                            delivered = true;
                            if tx.send(updates).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Failed to fetch shared snapshot: {}", e);
                            failed = true;
                        }
                    }
                }

                // The session starts empty when the first read fails. `seen`
                // stays unset so the next good read is still delivered.
                if failed && !delivered {
                    delivered = true;
                    if tx.send(None).is_err() {
                        break;
                    }
                }

                tokio::time::sleep(store.poll_interval).await;
            }
        });

        Ok(Subscription::new(handle))
    }

    async fn publish(&self, updates: &[Update]) -> Result<(), AppError> {
        let mut request = self
            .client
            .put(self.url("/api/shared/snapshot"))
            .json(updates);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Sync(format!(
                "Hub rejected publish with status {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}
