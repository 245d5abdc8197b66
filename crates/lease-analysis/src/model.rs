//! Gemini `generateContent` client
//!
//! Implements [`GenerativeModel`] over the REST API. Inline files are sent
//! base64-encoded in an `inline_data` part.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ModelError;
use crate::gateway::{GenerativeModel, InlineData};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl GeminiConfig {
    /// Load from GEMINI_API_KEY, GEMINI_MODEL and GEMINI_BASE_URL
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.model),
            base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            timeout: defaults.timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlinePart<'a> },
}

#[derive(Debug, Serialize)]
struct InlinePart<'a> {
    mime_type: &'a str,
    data: String,
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
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn build_request<'a>(prompt: &'a str, inline: Option<&'a InlineData>) -> GenerateRequest<'a> {
    let mut parts = Vec::with_capacity(2);
    if let Some(file) = inline {
        parts.push(Part::Inline {
            inline_data: InlinePart {
                mime_type: &file.mime_type,
                data: BASE64.encode(&file.data),
            },
        });
    }
    parts.push(Part::Text { text: prompt });

    GenerateRequest {
        contents: vec![Content {
            role: "user",
            parts,
        }],
    }
}

fn extract_text(body: &str) -> Result<String, ModelError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| ModelError::Parse(e.to_string()))?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(ModelError::EmptyResponse)
    } else {
        Ok(text)
    }
}

pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        inline: Option<&InlineData>,
    ) -> Result<String, ModelError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ModelError::MissingApiKey)?;

        let body = build_request(prompt, inline);
        debug!(
            model = %self.config.model,
            prompt_chars = prompt.len(),
            inline = inline.is_some(),
            "Calling generateContent"
        );

        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body_text = response
            .text()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if status != 200 {
            return Err(ModelError::Api {
                status,
                message: body_text.chars().take(500).collect(),
            });
        }

        extract_text(&body_text)
    }
}
