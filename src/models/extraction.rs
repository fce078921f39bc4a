//! Extraction request and result models.

use serde::{Deserialize, Serialize};

use super::{CodeEntry, ContentItem, Unit};

/// A normalized batch of entities pulled out of patch notes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedEntities {
    pub units: Vec<Unit>,
    pub codes: Vec<CodeEntry>,
    pub content_items: Vec<ContentItem>,
    pub qol: Vec<ContentItem>,
}

impl ExtractedEntities {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
            && self.codes.is_empty()
            && self.content_items.is_empty()
            && self.qol.is_empty()
    }
}

/// Request body for text extraction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractTextRequest {
    pub text: String,
}

/// One uploaded screenshot, base64 encoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpload {
    pub mime_type: String,
    pub data: String,
}

/// Request body for screenshot extraction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractImagesRequest {
    pub images: Vec<ImageUpload>,
}

/// Request body for admin login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub passphrase: String,
}
