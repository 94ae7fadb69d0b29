//! Anthropic Claude API client
//!
//! Implements the core `ModelClient` trait against the Messages API. One
//! non-streaming POST per completion; the core message types serialize
//! directly to the provider wire shape.

use async_trait::async_trait;
use komatachi_core::{
    ContentBlock, ModelClient, ModelError, ModelRequest, ModelResponse, StopReason,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Default connect timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default request timeout
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
/// Default pool idle timeout
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic API.
pub struct AnthropicClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

/// Builder for `AnthropicClient`.
pub struct AnthropicClientBuilder {
    api_key: String,
    base_url: String,
    connect_timeout: Duration,
    request_timeout: Duration,
    pool_idle_timeout: Duration,
}

impl AnthropicClientBuilder {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://api.anthropic.com".to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            pool_idle_timeout: DEFAULT_POOL_IDLE_TIMEOUT,
        }
    }

    /// Set custom base URL
    pub fn base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build the client with configured HTTP settings
    pub fn build(self) -> Result<AnthropicClient, ModelError> {
        let http = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .pool_idle_timeout(self.pool_idle_timeout)
            .build()
            .map_err(|err| ModelError::with_source("failed to build HTTP client", err))?;

        Ok(AnthropicClient {
            api_key: self.api_key,
            base_url: self.base_url,
            http,
        })
    }
}

impl AnthropicClient {
    /// Create a client with default HTTP settings.
    pub fn new(api_key: String) -> Result<Self, ModelError> {
        AnthropicClientBuilder::new(api_key).build()
    }

    /// Create a builder for more control over HTTP configuration.
    pub fn builder(api_key: String) -> AnthropicClientBuilder {
        AnthropicClientBuilder::new(api_key)
    }

    /// Create from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, ModelError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ModelError::new("ANTHROPIC_API_KEY is not set"))?;
        Self::new(api_key)
    }

    fn build_request_body(request: &ModelRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "system": request.system,
            "messages": request.messages,
        });
        if !request.tools.is_empty() {
            body["tools"] = serde_json::to_value(&request.tools).unwrap_or_default();
        }
        body
    }

    fn map_stop_reason(reason: Option<&str>) -> StopReason {
        match reason {
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        }
    }
}

/// The subset of the Messages API response the loop consumes.
#[derive(Deserialize)]
struct ApiMessage {
    content: Vec<Value>,
    stop_reason: Option<String>,
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let body = Self::build_request_body(&request);

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| ModelError::with_source("request to Anthropic failed", err))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ModelError::new(format!(
                "Anthropic returned {status}: {detail}"
            )));
        }

        let message: ApiMessage = response
            .json()
            .await
            .map_err(|err| ModelError::with_source("invalid response from Anthropic", err))?;

        // Unknown block types are dropped rather than failing the call.
        let content: Vec<ContentBlock> = message
            .content
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();

        Ok(ModelResponse {
            content,
            stop_reason: Self::map_stop_reason(message.stop_reason.as_deref()),
        })
    }
}
