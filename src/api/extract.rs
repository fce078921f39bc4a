//! Extraction API endpoints.

use axum::{extract::State, Json};
use base64::Engine;

use super::{error, require_admin, success, ApiResult};
use crate::errors::AppError;
use crate::extraction::ImageInput;
use crate::models::{ExtractImagesRequest, ExtractTextRequest, ExtractedEntities};
use crate::AppState;

/// POST /api/extract/text - Extract entities from a pasted patch log.
pub async fn extract_text(
    State(state): State<AppState>,
    Json(request): Json<ExtractTextRequest>,
) -> ApiResult<ExtractedEntities> {
    let revision_id = state.coordinator.revision().await;
    require_admin(&state, revision_id).await?;

    match state.extraction.extract_text(&request.text).await {
        Ok(batch) => success(batch, state.coordinator.revision().await),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/extract/images - Extract entities from base64 screenshots.
pub async fn extract_images(
    State(state): State<AppState>,
    Json(request): Json<ExtractImagesRequest>,
) -> ApiResult<ExtractedEntities> {
    let revision_id = state.coordinator.revision().await;
    require_admin(&state, revision_id).await?;

    let engine = base64::engine::general_purpose::STANDARD;
    let mut images = Vec::with_capacity(request.images.len());
    for (i, upload) in request.images.into_iter().enumerate() {
        if !upload.mime_type.starts_with("image/") {
            return error(
                AppError::Validation(format!("Upload {} is not an image", i + 1)),
                revision_id,
            );
        }
        match engine.decode(upload.data.as_bytes()) {
            Ok(bytes) => images.push(ImageInput {
                mime_type: upload.mime_type,
                bytes,
            }),
            Err(_) => {
                return error(
                    AppError::Validation(format!("Upload {} is not valid base64", i + 1)),
                    revision_id,
                )
            }
        }
    }

    match state.extraction.extract_images(images).await {
        Ok(batch) => success(batch, state.coordinator.revision().await),
        Err(e) => error(e, revision_id),
    }
}
