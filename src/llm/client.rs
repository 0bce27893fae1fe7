use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const PDF_MIME_TYPE: &str = "application/pdf";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A document handed to the model as inline data.
#[derive(Debug, Clone)]
pub struct Document {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl Document {
    pub fn pdf(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: PDF_MIME_TYPE,
        }
    }
}

/// One call to the model: a single key, a single model, document plus prompt.
pub struct GenerationRequest<'a> {
    pub api_key: &'a str,
    pub model: &'a str,
    pub document: &'a Document,
    pub prompt: &'a str,
}

/// Anything that can turn a document and a prompt into model text.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Returns the model's text. An empty string means the model answered
    /// without text, e.g. a blocked or truncated candidate.
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(GEMINI_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    fn build_request<'a>(request: &GenerationRequest<'a>) -> GeminiRequest<'a> {
        GeminiRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: request.document.mime_type,
                            data: STANDARD.encode(&request.document.bytes),
                        },
                    },
                    Part::Text { text: request.prompt },
                ],
            }],
        }
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", request.api_key)
            .json(&Self::build_request(request))
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to send request to Gemini API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            let error_msg = match status.as_u16() {
                400 => format!("Bad request for model {}: {}", request.model, error_text),
                401 | 403 => "API key rejected by Gemini".to_string(),
                404 => format!("Model {} is not available", request.model),
                429 => "Rate limit or quota exceeded".to_string(),
                500..=599 => format!("Gemini server error ({})", status),
                _ => format!("Gemini API error ({}): {}", status, error_text),
            };
            anyhow::bail!("{}", error_msg);
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        Ok(response_text(gemini_response))
    }
}

/// Concatenated text of the first candidate's parts.
fn response_text(response: GeminiResponse) -> String {
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
                .collect::<String>()
        })
        .unwrap_or_default()
}
