//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{schema, ExtractionInput, ExtractionService};
use crate::config::ExtractionConfig;
use crate::errors::AppError;

const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Extraction service backed by the Gemini REST API.
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(config: &ExtractionConfig, api_key: String) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
        })
    }

    fn build_request(input: &ExtractionInput) -> GenerateRequest {
        let parts = match input {
            ExtractionInput::Text(log) => vec![Part::Text(schema::text_instruction(log))],
            ExtractionInput::Images(images) => {
                let engine = base64::engine::general_purpose::STANDARD;
                images
                    .iter()
                    .map(|image| {
                        Part::InlineData(InlineData {
                            mime_type: image.mime_type.clone(),
                            data: engine.encode(&image.bytes),
                        })
                    })
                    .chain(std::iter::once(Part::Text(schema::image_instruction())))
                    .collect()
            }
        };

        GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema::response_schema(),
            },
        }
    }
}

#[async_trait]
impl ExtractionService for GeminiClient {
    async fn generate(&self, input: &ExtractionInput) -> Result<String, AppError> {
        let body = Self::build_request(input);

        tracing::debug!(endpoint = %self.endpoint, "Calling extraction service");

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Extraction(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Extraction(format!(
                "Service returned {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::Extraction(format!("Unreadable service response: {}", e)))?;

        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}
