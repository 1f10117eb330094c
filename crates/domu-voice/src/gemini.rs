//! Minimal client for the Gemini `generateContent` endpoint.
//!
//! Only the pieces the voice pipeline needs are modelled: a single user
//! message made of text and inline audio parts, and the concatenated text of
//! the first candidate in the response.

use crate::config::GeminiConfig;
use crate::error::VoiceError;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum number of characters of an error body echoed into a `VoiceError`.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// One part of a Gemini request message.
#[derive(Debug, Clone)]
pub enum GeminiPart {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
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

/// HTTP client bound to one Gemini API key.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    /// Builds a client. Fails if no API key is configured.
    pub fn new(config: GeminiConfig) -> Result<Self, VoiceError> {
        if config.api_key.trim().is_empty() {
            return Err(VoiceError::Config(
                "Gemini API key is not configured. Set gemini.api_key or GEMINI_API_KEY."
                    .to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VoiceError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Sends one user message and returns the trimmed text of the first candidate.
    ///
    /// A response without candidates yields an empty string rather than an error.
    pub async fn generate(&self, model: &str, parts: Vec<GeminiPart>) -> Result<String, VoiceError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model.trim_start_matches("models/")
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&build_request(parts))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(VoiceError::Http(format!(
                "Gemini returned {}: {}",
                status, body
            )));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        Ok(first_candidate_text(parsed))
    }
}

fn build_request(parts: Vec<GeminiPart>) -> GenerateContentRequest {
    let parts = parts
        .into_iter()
        .map(|part| match part {
            GeminiPart::Text(text) => RequestPart::Text { text },
            GeminiPart::InlineData { mime_type, data } => RequestPart::Inline {
                inline_data: InlineData {
                    mime_type,
                    data: base64::engine::general_purpose::STANDARD.encode(data),
                },
            },
        })
        .collect();

    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts,
        }],
    }
}

fn first_candidate_text(response: GenerateContentResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}
