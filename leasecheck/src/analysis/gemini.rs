//! Generative model client.
//!
//! [`GenerativeModel`] is the single seam to the external model: one prompt plus one inline
//! document in, free-form text out. [`GeminiModel`] implements it against the Gemini
//! `generateContent` REST endpoint with `reqwest`.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::config::GeminiConfig;
use crate::types::MediaType;

/// Document bytes in the form the model API takes inline binary content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineDocument {
    pub media_type: MediaType,
    /// Standard base64 of the raw file bytes
    pub data: String,
}

impl InlineDocument {
    pub fn encode(media_type: MediaType, bytes: &[u8]) -> Self {
        Self {
            media_type,
            data: STANDARD.encode(bytes),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Gemini API key is not configured")]
    NotConfigured,

    #[error("Gemini request timed out")]
    Timeout,

    #[error("Gemini request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Gemini API error: {status} - {body}")]
    Status { status: StatusCode, body: String },

    #[error("Gemini returned no candidates")]
    EmptyResponse,

    #[error("Gemini withheld the answer: finish reason {reason}")]
    Blocked { reason: String },

    #[error("invalid Gemini endpoint: {0}")]
    Endpoint(#[source] url::ParseError),

    #[error("error decoding Gemini response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() { ModelError::Timeout } else { ModelError::Http(e) }
    }
}

/// A generative model that can read a document and answer a prompt about it.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// One call, no retries, no streaming.
    async fn generate(&self, prompt: &str, document: &InlineDocument) -> Result<String, ModelError>;
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Finish reasons for which the model withholds or cuts the answer for policy reasons.
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "RECITATION", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

impl GenerateContentResponse {
    /// Text of the first candidate, all text parts joined.
    fn into_text(self) -> Result<String, ModelError> {
        let candidate = self.candidates.into_iter().next().ok_or(ModelError::EmptyResponse)?;

        if let Some(reason) = candidate.finish_reason
            && BLOCKING_FINISH_REASONS.contains(&reason.as_str())
        {
            return Err(ModelError::Blocked { reason });
        }

        let content = candidate.content.ok_or(ModelError::EmptyResponse)?;
        Ok(content.parts.into_iter().filter_map(|part| part.text).collect())
    }
}

/// Gemini `generateContent` over HTTPS.
pub struct GeminiModel {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: Url,
    request_timeout: Option<Duration>,
}

impl GeminiModel {
    pub fn new(config: &GeminiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            request_timeout: config.request_timeout,
        })
    }

    fn endpoint(&self) -> Result<Url, ModelError> {
        ensure_slash(&self.base_url)
            .join(&format!("v1beta/models/{}:generateContent", self.model))
            .map_err(ModelError::Endpoint)
    }
}

/// Makes sure a url has a trailing slash, so `join` appends instead of replacing the last segment.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let path = format!("{}/", new_url.path());
        new_url.set_path(&path);
        new_url
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    #[instrument(skip_all, fields(model = %self.model, media_type = %document.media_type))]
    async fn generate(&self, prompt: &str, document: &InlineDocument) -> Result<String, ModelError> {
        let api_key = self.api_key.as_deref().ok_or(ModelError::NotConfigured)?;
        let url = self.endpoint()?;

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: document.media_type.as_str(),
                            data: &document.data,
                        },
                    },
                ],
            }],
        };

        debug!(url = %url, payload_bytes = document.data.len(), "Calling Gemini generateContent");

        let mut request = self.client.post(url).header("x-goog-api-key", api_key).json(&body);
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Gemini generateContent request failed");
            return Err(ModelError::Status { status, body });
        }

        let body_text = response.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body_text).map_err(|e| {
            tracing::error!("Failed to parse Gemini response as JSON. Error: {}", e);
            ModelError::Decode(e.to_string())
        })?;

        parsed.into_text()
    }
}
