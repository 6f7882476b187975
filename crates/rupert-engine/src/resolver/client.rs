use super::reply::ReplyError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("No API key configured")]
    MissingApiKey,
    #[error("Model request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Model transport error: {0}")]
    Transport(String),
    #[error("Model API error: HTTP {status} - {body}")]
    Status { status: u16, body: String },
    #[error("No response text from model")]
    EmptyResponse,
    #[error("Invalid model response body: {0}")]
    InvalidBody(String),
    #[error("Unusable model reply: {0}")]
    Reply(#[from] ReplyError),
}

/// One model/version pair; endpoints are tried in configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEndpoint {
    pub api_version: String,
    pub model: String,
}

impl ModelEndpoint {
    pub fn new(api_version: &str, model: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            model: model.to_string(),
        }
    }
}

impl fmt::Display for ModelEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.model)
    }
}

pub fn default_endpoints() -> Vec<ModelEndpoint> {
    vec![
        ModelEndpoint::new("v1beta", "gemini-1.5-flash"),
        ModelEndpoint::new("v1beta", "gemini-1.5-pro"),
        ModelEndpoint::new("v1", "gemini-pro"),
        ModelEndpoint::new("v1beta", "gemini-pro"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_k: 1,
            top_p: 0.8,
            max_output_tokens: 2048,
        }
    }
}

/// A remote text-generation model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, endpoint: &ModelEndpoint, prompt: &str) -> Result<String, ModelError>;

    /// Whether the client has what it needs (an API key) to make calls.
    fn is_configured(&self) -> bool {
        true
    }

    fn set_api_key(&self, _api_key: Option<String>) {}
}

/// `generateContent` client for the Gemini API.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: RwLock<Option<String>>,
    generation: GenerationConfig,
    request_timeout: Duration,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_API_URL.to_string(),
            api_key: RwLock::new(api_key.filter(|k| !k.trim().is_empty())),
            generation: GenerationConfig::default(),
            request_timeout: Duration::from_secs(15),
        }
    }

    /// Points the client at another host (a proxy, or a mock server in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn api_key(&self) -> Option<String> {
        self.api_key.read().ok().and_then(|k| k.clone())
    }

    fn url_for(&self, endpoint: &ModelEndpoint) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, endpoint.api_version, endpoint.model
        )
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, endpoint: &ModelEndpoint, prompt: &str) -> Result<String, ModelError> {
        let api_key = self.api_key().ok_or(ModelError::MissingApiKey)?;
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": self.generation,
        });

        debug!(endpoint = %endpoint, "Calling model");
        let response = self
            .http
            .post(self.url_for(endpoint))
            .query(&[("key", api_key.as_str())])
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidBody(e.to_string()))?;
        let text = data
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)?;
        Ok(text.to_string())
    }

    fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }

    fn set_api_key(&self, api_key: Option<String>) {
        if let Ok(mut slot) = self.api_key.write() {
            *slot = api_key.filter(|k| !k.trim().is_empty());
        }
    }
}

impl GeminiClient {
    fn transport_error(&self, e: reqwest::Error) -> ModelError {
        if e.is_timeout() {
            ModelError::Timeout(self.request_timeout)
        } else {
            ModelError::Transport(e.to_string())
        }
    }
}
