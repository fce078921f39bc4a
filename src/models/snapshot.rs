//! Snapshot models for local and shared persistence.

use serde::{Deserialize, Serialize};

use super::Update;

/// Everything the local store persists, session flags included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalSnapshot {
    #[serde(default)]
    pub updates: Vec<Update>,
    #[serde(default)]
    pub active_update_id: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Revision information for change detection on the shared hub.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub revision_id: i64,
    pub generated_at: String,
}

/// The session as the UI sees it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub ready: bool,
    pub updates: Vec<Update>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_update_id: Option<String>,
    pub is_admin: bool,
    pub extraction_status: String,
}
