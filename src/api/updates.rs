//! Update API endpoints.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};

use super::{error, require_admin, success, ApiResult};
use crate::errors::{AppError, AppErrorWithRevision};
use crate::export;
use crate::models::{RenameUpdateRequest, Update, UpdatePatch};
use crate::AppState;

/// POST /api/updates - Add a default-named update and select it.
pub async fn create_update(State(state): State<AppState>) -> ApiResult<Update> {
    let revision_id = state.coordinator.revision().await;
    require_admin(&state, revision_id).await?;

    let id = match state.coordinator.add_update().await {
        Ok(id) => id,
        Err(e) => return error(e, revision_id),
    };

    match state.coordinator.get_update(&id).await {
        Some(update) => success(update, state.coordinator.revision().await),
        None => error(
            AppError::Internal(format!("Update {} vanished after creation", id)),
            revision_id,
        ),
    }
}

/// PUT /api/updates/:id - Replace any subset of an update's fields.
pub async fn patch_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<UpdatePatch>,
) -> ApiResult<Update> {
    let revision_id = state.coordinator.revision().await;
    require_admin(&state, revision_id).await?;

    match state.coordinator.patch_update(&id, &patch).await {
        Ok(update) => success(update, state.coordinator.revision().await),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/updates/:id/name - Rename an update.
pub async fn rename_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RenameUpdateRequest>,
) -> ApiResult<Update> {
    let revision_id = state.coordinator.revision().await;
    require_admin(&state, revision_id).await?;

    match state.coordinator.rename_update(&id, &request.name).await {
        Ok(update) => success(update, state.coordinator.revision().await),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/updates/:id - Remove an update. The last one is kept.
pub async fn delete_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let revision_id = state.coordinator.revision().await;
    require_admin(&state, revision_id).await?;

    match state.coordinator.remove_update(&id).await {
        Ok(removed) => success(removed, state.coordinator.revision().await),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/updates/:id/select - Make an update active. Open to viewers.
pub async fn select_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Option<String>> {
    let revision_id = state.coordinator.revision().await;

    match state.coordinator.select_update(&id).await {
        Ok(active) => success(active, state.coordinator.revision().await),
        Err(e) => error(e, revision_id),
    }
}

async fn find_update(state: &AppState, id: &str) -> Result<Update, AppErrorWithRevision> {
    match state.coordinator.get_update(id).await {
        Some(update) => Ok(update),
        None => Err(AppErrorWithRevision {
            error: AppError::NotFound(format!("Update {} not found", id)),
            revision_id: state.coordinator.revision().await,
        }),
    }
}

/// GET /api/updates/:id/export/units - Units as clipboard text.
pub async fn export_units(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppErrorWithRevision> {
    let update = find_update(&state, &id).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        export::units_text(&update),
    ))
}

/// GET /api/updates/:id/export/codes - Codes as clipboard text.
pub async fn export_codes(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppErrorWithRevision> {
    let update = find_update(&state, &id).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        export::codes_text(&update),
    ))
}
