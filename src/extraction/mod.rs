//! Extraction pipeline: patch notes in, structured entities merged into the
//! active update.
//!
//! One request runs at a time. The merge target is the update that was
//! active when the request started, so switching updates mid-flight does not
//! redirect the batch.

mod gemini;
mod normalize;
mod schema;

pub use gemini::GeminiClient;
pub use normalize::normalize_response;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use crate::errors::AppError;
use crate::models::ExtractedEntities;
use crate::sync::SyncCoordinator;

const IMAGES_FAILED: &str = "AI failed to scan images. Check your network or API Key.";
const TEXT_FAILED: &str = "AI failed to parse the text log. Check your network or API Key.";

/// One screenshot, already decoded.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// What gets sent to the extraction service.
#[derive(Debug, Clone)]
pub enum ExtractionInput {
    Text(String),
    Images(Vec<ImageInput>),
}

impl ExtractionInput {
    fn is_empty(&self) -> bool {
        match self {
            ExtractionInput::Text(text) => text.trim().is_empty(),
            ExtractionInput::Images(images) => images.is_empty(),
        }
    }

    fn status_message(&self) -> &'static str {
        match self {
            ExtractionInput::Text(_) => "Parsing text log...",
            ExtractionInput::Images(_) => "Scanning screenshots...",
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            ExtractionInput::Text(_) => TEXT_FAILED,
            ExtractionInput::Images(_) => IMAGES_FAILED,
        }
    }
}

/// A model that turns patch notes into the raw JSON response text.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn generate(&self, input: &ExtractionInput) -> Result<String, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    Idle,
    InProgress(&'static str),
}

impl ExtractionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionStatus::Idle => "idle",
            ExtractionStatus::InProgress(message) => *message,
        }
    }
}

/// Resets the published status when the request ends, however it ends.
struct StatusGuard<'a> {
    status: &'a watch::Sender<ExtractionStatus>,
}

impl<'a> StatusGuard<'a> {
    fn enter(status: &'a watch::Sender<ExtractionStatus>, message: &'static str) -> Self {
        status.send_replace(ExtractionStatus::InProgress(message));
        Self { status }
    }
}

impl Drop for StatusGuard<'_> {
    fn drop(&mut self) {
        self.status.send_replace(ExtractionStatus::Idle);
    }
}

pub struct ExtractionPipeline {
    service: Option<Arc<dyn ExtractionService>>,
    coordinator: SyncCoordinator,
    status: watch::Sender<ExtractionStatus>,
    serial: Mutex<()>,
}

impl ExtractionPipeline {
    /// Without a service every request fails with the usual extraction error.
    pub fn new(service: Option<Arc<dyn ExtractionService>>, coordinator: SyncCoordinator) -> Self {
        let (status, _) = watch::channel(ExtractionStatus::Idle);
        Self {
            service,
            coordinator,
            status,
            serial: Mutex::new(()),
        }
    }

    pub fn status(&self) -> ExtractionStatus {
        *self.status.borrow()
    }

    pub async fn extract_text(&self, text: &str) -> Result<ExtractedEntities, AppError> {
        self.extract(ExtractionInput::Text(text.to_string())).await
    }

    pub async fn extract_images(
        &self,
        images: Vec<ImageInput>,
    ) -> Result<ExtractedEntities, AppError> {
        self.extract(ExtractionInput::Images(images)).await
    }

    /// Run one request and append its batch to the update active at start.
    pub async fn extract(&self, input: ExtractionInput) -> Result<ExtractedEntities, AppError> {
        if input.is_empty() {
            return Ok(ExtractedEntities::default());
        }

        let _serial = self.serial.lock().await;

        let target = self
            .coordinator
            .active_update_id()
            .await
            .ok_or_else(|| AppError::Validation("No update is selected".to_string()))?;

        let _status = StatusGuard::enter(&self.status, input.status_message());
        tracing::info!(target_update = %target, kind = input.status_message(), "Extraction started");

        match self.run(&input, &target).await {
            Ok(batch) => {
                tracing::info!(
                    target_update = %target,
                    units = batch.units.len(),
                    codes = batch.codes.len(),
                    content_items = batch.content_items.len(),
                    qol = batch.qol.len(),
                    "Extraction merged"
                );
                Ok(batch)
            }
            Err(e) => {
                tracing::error!(target_update = %target, "Extraction failed: {}", e);
                Err(AppError::Extraction(input.failure_message().to_string()))
            }
        }
    }

    async fn run(&self, input: &ExtractionInput, target: &str) -> Result<ExtractedEntities, AppError> {
        let service = self
            .service
            .as_ref()
            .ok_or_else(|| AppError::Extraction("No extraction service configured".to_string()))?;

        let raw = service.generate(input).await?;
        let batch = normalize_response(&raw)?;
        self.coordinator.append_extracted(target, &batch).await?;
        Ok(batch)
    }
}
