//! Anthropic Messages API backend for [`ReasoningService`].

use crate::error::ApiError;
use crate::reasoning::ReasoningService;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const API_VERSION: &str = "2023-06-01";
const PLACEHOLDER_KEY: &str = "your-api-key-here";

#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Reads `ANTHROPIC_API_KEY` (plus optional `ANTHROPIC_BASE_URL`, `ANTHROPIC_MODEL`).
    /// Returns `None` when the key is missing, blank or still the placeholder.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("ANTHROPIC_API_KEY").ok()?;
        let key = key.trim();
        if key.is_empty() || key == PLACEHOLDER_KEY {
            return None;
        }
        let mut config = Self::new(key);
        if let Ok(url) = std::env::var("ANTHROPIC_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("ANTHROPIC_MODEL") {
            config.model = model;
        }
        Some(config)
    }
}

pub struct AnthropicClient {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Connection(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn request_body(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Value {
        json!({
            "model": self.config.model,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "messages": [{ "role": "user", "content": prompt }],
        })
    }
}

fn response_text(body: &Value) -> Option<String> {
    body["content"]
        .as_array()?
        .iter()
        .find(|block| block["type"].as_str() == Some("text"))
        .and_then(|block| block["text"].as_str())
        .map(str::to_string)
}

/// Extracts the reply text. An undecodable body is [`ApiError::Api`].
fn decode_response(raw: &str) -> Result<String, ApiError> {
    let body: Value = serde_json::from_str(raw)
        .map_err(|e| ApiError::Api(format!("malformed response body: {e}")))?;
    response_text(&body).ok_or_else(|| ApiError::Api("response has no text content".into()))
}

impl ReasoningService for AnthropicClient {
    fn ask(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String, ApiError> {
        debug!(prompt_chars = prompt.len(), max_tokens, "sending analysis request");
        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.request_body(prompt, max_tokens, temperature))
            .send()
            .map_err(|e| ApiError::Connection(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("analysis request rate limited");
            return Err(ApiError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            warn!(%status, "analysis request failed");
            return Err(ApiError::Api(format!("status {status}: {text}")));
        }

        let raw = response
            .text()
            .map_err(|e| ApiError::Connection(e.to_string()))?;
        decode_response(&raw)
    }
}
