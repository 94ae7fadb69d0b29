//! Model client seam
//!
//! The turn loop is provider-agnostic: it speaks to whatever implements
//! `ModelClient`. Retries, timeouts, and cancellation live inside
//! implementations; errors cross the seam with their cause chain intact.

use crate::types::{ContentBlock, Message, StopReason, ToolDef};
use async_trait::async_trait;

/// One completion request. `messages` is a fresh copy owned by the request.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    /// Wire-form tools; empty means the tools field is omitted entirely.
    pub tools: Vec<ToolDef>,
    pub max_tokens: u32,
}

/// The model's reply: ordered content blocks plus why it stopped.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
}

impl ModelResponse {
    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for block in &self.content {
            if let ContentBlock::Text { text } = block {
                out.push_str(text);
            }
        }
        out
    }
}

/// A failed model call, preserving the underlying cause.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ModelError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ModelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Abstraction over the LLM provider.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}
