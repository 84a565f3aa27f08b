//! Google Gemini provider implementation.
//!
//! Calls the `generateContent` endpoint of the Generative Language API with a
//! single user turn and returns the concatenated text parts of the first
//! candidate. One HTTP attempt per call; retries are the caller's business.

use std::time::Duration;

use async_trait::async_trait;
use docchat_core::GenerationService;
use docchat_core::error::GenerationError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default public endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// A Gemini `generateContent` client.
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl GeminiClient {
    /// Create a client with the default endpoint, model and a 60 s timeout.
    pub fn new(api_key: impl Into<String>) -> Result<Self, GenerationError> {
        Self::builder(api_key).build()
    }

    pub fn builder(api_key: impl Into<String>) -> GeminiClientBuilder {
        GeminiClientBuilder {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            timeout: Duration::from_secs(60),
            temperature: None,
            max_output_tokens: None,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body(&self, prompt: &str) -> GenerateRequest {
        let generation_config =
            if self.temperature.is_some() || self.max_output_tokens.is_some() {
                Some(ApiGenerationConfig {
                    temperature: self.temperature,
                    max_output_tokens: self.max_output_tokens,
                })
            } else {
                None
            };

        GenerateRequest {
            contents: vec![ApiContent {
                role: Some("user".into()),
                parts: vec![ApiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config,
        }
    }
}

/// Builder for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiClientBuilder {
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl GeminiClientBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_output_tokens(mut self, max_output_tokens: Option<u32>) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn build(self) -> Result<GeminiClient, GenerationError> {
        if self.api_key.trim().is_empty() {
            return Err(GenerationError::AuthenticationFailed(
                "API key is empty".into(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| GenerationError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(GeminiClient {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            model: self.model,
            api_key: self.api_key,
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            client,
        })
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = self.endpoint();
        let body = self.request_body(prompt);

        debug!(model = %self.model, prompt_chars = prompt.len(), "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status().as_u16();

        if !(200..300).contains(&status) {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini returned error");
            return Err(classify_error(status, &error_body, retry_after));
        }

        let api_response: GenerateResponse =
            response.json().await.map_err(|e| GenerationError::ApiError {
                status_code: status,
                message: format!("Failed to parse response: {e}"),
            })?;

        extract_text(api_response)
    }

    async fn health_check(&self) -> Result<bool, GenerationError> {
        let url = format!("{}/models/{}", self.base_url, self.model);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(map_transport_error)?;

        Ok(response.status().is_success())
    }
}

fn map_transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout(e.to_string())
    } else {
        GenerationError::Network(e.to_string())
    }
}

/// Map a non-2xx response onto the error taxonomy.
fn classify_error(status: u16, body: &str, retry_after: Option<u64>) -> GenerationError {
    let message = serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        401 | 403 => GenerationError::AuthenticationFailed(message),
        400 if body.contains("API_KEY_INVALID") => GenerationError::AuthenticationFailed(message),
        429 => GenerationError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(5),
        },
        _ => GenerationError::ApiError {
            status_code: status,
            message,
        },
    }
}

/// Pull the answer text out of a successful response.
fn extract_text(response: GenerateResponse) -> Result<String, GenerationError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|f| f.block_reason)
    {
        return Err(GenerationError::Blocked(reason));
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(GenerationError::EmptyResponse);
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return match candidate.finish_reason.as_deref() {
            Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT")) => {
                Err(GenerationError::Blocked(reason.to_string()))
            }
            _ => Err(GenerationError::EmptyResponse),
        };
    }

    Ok(text)
}

// --- Gemini API types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<ApiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<ApiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}
