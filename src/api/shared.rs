//! Shared hub API endpoints.
//!
//! Revision ids here are the hub's persisted revision, not the session counter.

use axum::{extract::State, Json};

use super::{error, success, ApiResult};
use crate::models::{RevisionInfo, Update};
use crate::AppState;

/// GET /api/shared/snapshot - The shared collection, `null` until first written.
pub async fn get_shared_snapshot(
    State(state): State<AppState>,
) -> ApiResult<Option<Vec<Update>>> {
    match state.hub.snapshot().await {
        Ok((updates, revision_id)) => success(updates, revision_id),
        Err(e) => error(e, 0),
    }
}

/// GET /api/shared/revision - Current hub revision for change detection.
pub async fn get_shared_revision(State(state): State<AppState>) -> ApiResult<RevisionInfo> {
    match state.hub.revision_info().await {
        Ok(info) => {
            let revision_id = info.revision_id;
            success(info, revision_id)
        }
        Err(e) => error(e, 0),
    }
}

/// PUT /api/shared/snapshot - Overwrite the shared collection.
pub async fn put_shared_snapshot(
    State(state): State<AppState>,
    Json(updates): Json<Vec<Update>>,
) -> ApiResult<RevisionInfo> {
    let revision_id = match state.hub.write(&updates).await {
        Ok(revision_id) => revision_id,
        Err(e) => {
            tracing::error!("Failed to write shared snapshot: {}", e);
            return error(e, 0);
        }
    };

    match state.hub.revision_info().await {
        Ok(info) => success(info, revision_id),
        Err(e) => error(e, revision_id),
    }
}
