pub mod models;

pub use models::GeminiModel;

use crate::config::KeyFromEnv;
use crate::core::{Document, LowLevelClient};
use crate::error::{AIError, ConfigError, GeminiError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Gemini REST base URL used by the Developer API.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback", default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason", default)]
    block_reason: Option<String>,
}

/// Configuration for the Gemini client. Sampling defaults favour determinism.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: GeminiModel,
    pub base_url: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: GeminiModel::default(),
            base_url: GEMINI_API_BASE_URL.to_string(),
            temperature: 0.3,
            top_p: 0.7,
            top_k: 40,
            max_output_tokens: 8192,
            timeout: Duration::from_secs(120),
        }
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), ..Self::default() }
    }

    /// Read the key from `GEMINI_API_KEY` (environment or `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(GeminiClient::require_key()?))
    }

    #[must_use]
    pub fn with_model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model.id()
        )
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.config.model.id())
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl KeyFromEnv for GeminiClient {
    const KEY_NAME: &'static str = "GEMINI_API_KEY";
}

impl GeminiClient {
    /// Create a new Gemini client with full configuration
    pub fn new(config: GeminiConfig) -> Result<Self, AIError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AIError::Gemini(GeminiError::Http(e.to_string())))?;

        info!(model = %config.model.id(), timeout_secs = config.timeout.as_secs(), "Creating new Gemini client");
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn build_request(&self, prompt: String, document: &Document) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![
                    Part { text: Some(prompt), ..Part::default() },
                    Part {
                        inline_data: Some(InlineData {
                            mime_type: document.mime_type.clone(),
                            data: BASE64.encode(&document.bytes),
                        }),
                        ..Part::default()
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }
}

/// Concatenate the text parts of the first candidate, skipping thought parts.
fn response_text(response: GenerateContentResponse) -> Result<String, GeminiError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GeminiError::Blocked(reason));
    }

    let candidate = response.candidates.into_iter().next().ok_or(GeminiError::EmptyResponse)?;
    if let Some(reason) = candidate.finish_reason.as_deref() {
        if reason == "SAFETY" || reason == "PROHIBITED_CONTENT" || reason == "BLOCKLIST" {
            return Err(GeminiError::Blocked(reason.to_string()));
        }
    }

    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| !p.thought.unwrap_or(false))
        .filter_map(|p| p.text)
        .collect();

    if text.trim().is_empty() {
        return Err(GeminiError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl LowLevelClient for GeminiClient {
    #[instrument(skip(self, prompt, document), fields(prompt_len = prompt.len(), document_len = document.len(), model = %self.config.model.id()))]
    async fn ask_raw(&self, prompt: String, document: Document) -> Result<String, AIError> {
        debug!(mime_type = %document.mime_type, "Preparing Gemini API request");

        let request = self.build_request(prompt, &document);

        debug!("Sending request to Gemini API");
        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request failed");
                if e.is_timeout() {
                    AIError::Gemini(GeminiError::Timeout)
                } else {
                    AIError::Gemini(GeminiError::Http(e.to_string()))
                }
            })?;

        let status = response.status();
        debug!(status = %status, "Received response from Gemini API");

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Gemini API rate limit exceeded");
            return Err(AIError::Gemini(GeminiError::RateLimit));
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            error!("Gemini API authentication failed");
            return Err(AIError::Gemini(GeminiError::Authentication));
        }

        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Gemini API error");
            return Err(AIError::Gemini(GeminiError::Api { status: status.as_u16(), message: error_text }));
        }

        let gemini_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to parse Gemini response JSON");
                AIError::Gemini(GeminiError::Http(e.to_string()))
            })?;

        debug!(candidates = gemini_response.candidates.len(), "Parsed Gemini response");

        let result = response_text(gemini_response).map_err(AIError::Gemini);

        match &result {
            Ok(text) => info!(response_len = text.len(), "Successfully received Gemini response"),
            Err(e) => error!(error = %e, "Failed to extract content from Gemini response"),
        }

        result
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        Box::new(self.clone())
    }
}
