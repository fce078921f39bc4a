//! Session API endpoints.

use axum::{extract::State, Json};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{LoginRequest, SessionView};
use crate::sync::SyncState;
use crate::AppState;

/// The session as the UI renders it.
pub async fn session_view(state: &AppState) -> (SessionView, i64) {
    let snapshot = state.coordinator.snapshot().await;
    let view = SessionView {
        ready: snapshot.state == SyncState::Ready,
        updates: Vec::clone(&snapshot.updates),
        active_update_id: snapshot.active_update_id,
        is_admin: snapshot.is_admin,
        extraction_status: state.extraction.status().label().to_string(),
    };
    (view, snapshot.revision)
}

/// GET /api/session - Current session state.
pub async fn get_session(State(state): State<AppState>) -> ApiResult<SessionView> {
    let (view, revision_id) = session_view(&state).await;
    success(view, revision_id)
}

/// POST /api/session/login - Enter admin mode.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<SessionView> {
    if !state.admin.verify(&request.passphrase) {
        tracing::warn!("Rejected admin login attempt");
        let revision_id = state.coordinator.revision().await;
        return error(
            AppError::Unauthorized("Invalid passphrase".to_string()),
            revision_id,
        );
    }

    state.coordinator.set_admin(true).await;
    let (view, revision_id) = session_view(&state).await;
    success(view, revision_id)
}

/// POST /api/session/logout - Leave admin mode.
pub async fn logout(State(state): State<AppState>) -> ApiResult<SessionView> {
    state.coordinator.set_admin(false).await;
    let (view, revision_id) = session_view(&state).await;
    success(view, revision_id)
}
