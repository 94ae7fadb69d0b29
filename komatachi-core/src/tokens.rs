//! Token estimation
//!
//! Four characters per token, rounded up. Pessimistic enough for budgeting
//! once combined with the safety margin compaction applies to its input.

use crate::types::{ContentBlock, Message, MessageContent};

/// Estimate tokens for a plain string: `ceil(chars / 4)`.
pub fn estimate_string_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Estimate tokens for a message over its textualization.
pub fn estimate_message_tokens(message: &Message) -> u64 {
    estimate_string_tokens(&textualize(message))
}

/// Render a message to the text the estimator counts: text blocks as-is,
/// tool_use inputs JSON-encoded, tool_result content flattened.
fn textualize(message: &Message) -> String {
    match &message.content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Blocks(blocks) => {
            let mut out = String::new();
            for block in blocks {
                match block {
                    ContentBlock::Text { text } => out.push_str(text),
                    ContentBlock::ToolUse { input, .. } => {
                        out.push_str(&serde_json::to_string(input).unwrap_or_default());
                    }
                    ContentBlock::ToolResult { content, .. } => {
                        out.push_str(&content.flatten());
                    }
                }
            }
            out
        }
    }
}
