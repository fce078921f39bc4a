//! REST API module.
//!
//! Contains the editor routes, the shared hub routes and the response envelope.

mod extract;
mod session;
mod shared;
mod updates;

pub use extract::*;
pub use session::*;
pub use shared::*;
pub use updates::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::{AppError, AppErrorWithRevision};
use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, revision_id: i64) -> ApiResult<T> {
    Err(AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Reject the request unless the session is in admin mode.
async fn require_admin(state: &AppState, revision_id: i64) -> Result<(), AppErrorWithRevision> {
    if state.coordinator.is_admin().await {
        Ok(())
    } else {
        Err(AppErrorWithRevision {
            error: AppError::Unauthorized("Admin mode is required".to_string()),
            revision_id,
        })
    }
}
