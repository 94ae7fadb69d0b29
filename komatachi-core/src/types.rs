//! Core types for Komatachi
//!
//! These types form the representation boundary: they serialize both to the
//! transcript on disk and to the provider wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A block of structured message content, preserving order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text output.
    Text { text: String },

    /// Tool invocation requested by the model.
    ToolUse {
        id: String,
        name: String,
        /// Arguments as an opaque JSON value. Only dispatch parses this.
        input: Value,
    },

    /// Result fed back for a prior tool_use with the same id.
    ToolResult {
        tool_use_id: String,
        content: ToolResultContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// A successful tool result. `is_error` is omitted from the wire.
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: ToolResultContent::Text(content.into()),
            is_error: None,
        }
    }

    /// A failed tool result, flagged for the model.
    pub fn tool_result_error(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: ToolResultContent::Text(content.into()),
            is_error: Some(true),
        }
    }

    /// Whether this is a tool_result carrying `is_error = true`.
    pub fn is_error_result(&self) -> bool {
        matches!(
            self,
            Self::ToolResult {
                is_error: Some(true),
                ..
            }
        )
    }
}

/// Tool result payload: a plain string or a sequence of text blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl ToolResultContent {
    /// Flatten to plain text (text blocks concatenated).
    pub fn flatten(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => {
                let mut out = String::new();
                for block in blocks {
                    if let ContentBlock::Text { text } = block {
                        out.push_str(text);
                    }
                }
                out
            }
        }
    }
}

/// Message content: a plain string or an ordered sequence of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A message in the conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// A user message bundling tool results back to the model.
    pub fn tool_results(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Plain string content, if that is what this message carries.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::Blocks(_) => None,
        }
    }

    /// Content blocks; empty for plain string content.
    pub fn blocks(&self) -> &[ContentBlock] {
        match &self.content {
            MessageContent::Text(_) => &[],
            MessageContent::Blocks(blocks) => blocks,
        }
    }

    /// Visible text: string content as-is, otherwise text blocks concatenated.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => {
                let mut out = String::new();
                for block in blocks {
                    if let ContentBlock::Text { text } = block {
                        out.push_str(text);
                    }
                }
                out
            }
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Model finished naturally.
    #[default]
    EndTurn,
    /// Model wants tool results before continuing.
    ToolUse,
    /// Hit the output token cap.
    MaxTokens,
}

/// Wire form of a tool: what the model sees. The handler never leaves the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Conversation metadata, persisted as `metadata.json`.
///
/// Field names are camelCase on disk; timestamps are epoch milliseconds.
/// `created_at` is immutable after initialization; `updated_at` and
/// `compaction_count` are monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMetadata {
    pub created_at: u64,
    pub updated_at: u64,
    pub compaction_count: u32,
    pub model: Option<String>,
}

/// Partial metadata update. `created_at` is deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub compaction_count: Option<u32>,
    pub model: Option<String>,
}

/// File side-effects accumulated over a span of the conversation.
///
/// A path that was edited or written is not counted as merely read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileOperations {
    pub read: BTreeSet<String>,
    pub edited: BTreeSet<String>,
    pub written: BTreeSet<String>,
}

impl FileOperations {
    /// Paths only read: `read \ (edited ∪ written)`, sorted.
    pub fn files_read(&self) -> Vec<String> {
        self.read
            .iter()
            .filter(|path| !self.edited.contains(*path) && !self.written.contains(*path))
            .cloned()
            .collect()
    }

    /// Paths touched: `edited ∪ written`, sorted.
    pub fn files_modified(&self) -> Vec<String> {
        self.edited.union(&self.written).cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.edited.is_empty() && self.written.is_empty()
    }
}
