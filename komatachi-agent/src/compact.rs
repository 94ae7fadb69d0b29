//! Identity-aware compaction
//!
//! Replaces the oldest part of the transcript with a first-person summary
//! written from the entity's perspective. The kept tail is chosen so that at
//! least a reserve of tokens stays free afterwards, which keeps the very
//! next turn from re-triggering compaction. A failed summarizer call fails
//! the turn: substituting a placeholder would silently erase history.

use crate::error::AgentError;
use crate::turn::Agent;
use komatachi_core::{
    estimate_message_tokens, select_messages, ContentBlock, FileOperations, Message,
    MessageContent, MetadataPatch, ModelClient, ModelRequest, Role,
};
use std::collections::HashSet;

/// Marker prefix identifying a compaction summary in the transcript.
pub const SUMMARY_PREFIX: &str = "[Conversation Summary]\n\n";

/// Headroom left free after compaction: `min(20_000, budget / 2)`.
const SUMMARY_RESERVE_TOKENS: u64 = 20_000;

/// Most failure entries a summary will carry; the rest collapse to a count.
const MAX_TOOL_FAILURES: usize = 8;

/// Per-failure length cap, ellipsis included.
const TOOL_FAILURE_MAX_CHARS: usize = 240;

const SUMMARIZER_SYSTEM_PROMPT: &str = "\
You are summarizing the oldest part of an ongoing conversation on behalf of a persistent \
entity. The entity's memory works through recursive compaction: this summary will replace \
the original messages in its transcript, and any detail you do not preserve is lost forever.

Write as the entity itself, in first person, past tense.";

const PRESERVATION_CRITERIA: &str = "\
Preserve, in priority order:
1. Relational context: interactions, commitments, trust, emotional moments.
2. Identity development: what I learned about myself.
3. Important facts, decisions, and the reasoning behind them.
4. Promises and responsibilities I took on.
5. Operational details; compress these aggressively.

Write in first-person past tense. Include short verbatim quotes where the wording itself \
carried emotional weight or a commitment. Omit routine exchanges.";

impl<M: ModelClient + ?Sized> Agent<M> {
    /// Compact the transcript down to a summary plus a kept tail.
    pub(crate) async fn compact(
        &mut self,
        budget: u64,
        soul: Option<&str>,
    ) -> Result<(), AgentError> {
        let reserve = SUMMARY_RESERVE_TOKENS.min(budget / 2);
        let keep_budget = budget - reserve;

        let (kept, dropped) = {
            let messages = self.store.messages()?;
            let selection = select_messages(messages, keep_budget, estimate_message_tokens);
            let kept = selection.selected.to_vec();
            let dropped = messages[..messages.len() - kept.len()].to_vec();
            (kept, dropped)
        };

        let dropped_tokens: u64 = dropped.iter().map(estimate_message_tokens).sum();
        let input_tokens = input_tokens_with_margin(dropped_tokens);
        let limit = summarizer_input_limit(self.config.context_window);
        if input_tokens > limit {
            return Err(AgentError::CompactionInputTooLarge {
                input_tokens,
                limit,
            });
        }

        let previous_summary = previous_summary(&dropped);
        let system = summarizer_system_prompt(soul);
        let prompt = summarizer_user_prompt(&dropped, previous_summary);

        tracing::info!(
            dropped = dropped.len(),
            kept = kept.len(),
            recursive = previous_summary.is_some(),
            "summarizing dropped transcript prefix"
        );
        let response = self
            .client
            .complete(ModelRequest {
                model: self.config.model.clone(),
                system,
                messages: vec![Message::user(prompt)],
                tools: Vec::new(),
                max_tokens: self.config.max_tokens,
            })
            .await
            .map_err(AgentError::ModelCall)?;

        let summary = assemble_summary(&response.text(), &tool_failures(&dropped), &self.file_ops);

        let mut transcript = Vec::with_capacity(kept.len() + 1);
        transcript.push(Message::user(format!("{SUMMARY_PREFIX}{summary}")));
        transcript.extend(kept);
        self.store.replace_transcript(&transcript)?;

        let compaction_count = self.store.metadata()?.compaction_count + 1;
        self.store.update_metadata(MetadataPatch {
            compaction_count: Some(compaction_count),
            model: None,
        })?;
        Ok(())
    }
}

/// The estimator is optimistic for summarizer input, so pad by 20%.
fn input_tokens_with_margin(tokens: u64) -> u64 {
    (tokens as f64 * 1.2).ceil() as u64
}

/// The summarizer refuses inputs past three quarters of the window.
fn summarizer_input_limit(context_window: u64) -> u64 {
    context_window * 3 / 4
}

/// A drop set that begins with an earlier summary means this is recursive
/// compaction: that summary's content must be preserved, not re-abstracted.
fn previous_summary(dropped: &[Message]) -> Option<&str> {
    let first = dropped.first()?;
    if first.role != Role::User {
        return None;
    }
    first.as_text()?.strip_prefix(SUMMARY_PREFIX)
}

fn summarizer_system_prompt(soul: Option<&str>) -> String {
    match soul {
        Some(soul) => format!("{SUMMARIZER_SYSTEM_PROMPT}\n\n{soul}"),
        None => SUMMARIZER_SYSTEM_PROMPT.to_string(),
    }
}

fn summarizer_user_prompt(dropped: &[Message], previous_summary: Option<&str>) -> String {
    let mut rendered = String::new();
    for message in dropped {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let content = match &message.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => {
                serde_json::to_string(blocks).unwrap_or_default()
            }
        };
        rendered.push_str(&format!("[{role}]: {content}\n"));
    }

    let mut prompt = format!(
        "Summarize this conversation so I can remember it:\n\n{rendered}\n{PRESERVATION_CRITERIA}"
    );
    if let Some(previous) = previous_summary {
        prompt.push_str(
            "\n\nThe conversation opens with a summary from an earlier compaction. \
             Carry its content forward intact; do not abstract it further:\n\n",
        );
        prompt.push_str(previous);
    }
    prompt
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ToolFailure {
    name: String,
    summary: String,
}

/// Collect failed tool results from the drop set, oldest first.
///
/// The tool name comes from the matching tool_use in the preceding assistant
/// message; an unmatched id falls back to "tool". Duplicate `tool_use_id`s
/// are reported once.
fn tool_failures(dropped: &[Message]) -> Vec<ToolFailure> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut failures = Vec::new();

    for (index, message) in dropped.iter().enumerate() {
        for block in message.blocks() {
            let ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error: Some(true),
            } = block
            else {
                continue;
            };
            if !seen.insert(tool_use_id) {
                continue;
            }
            failures.push(ToolFailure {
                name: resolve_tool_name(dropped, index, tool_use_id),
                summary: normalize_failure(&content.flatten()),
            });
        }
    }
    failures
}

fn resolve_tool_name(messages: &[Message], result_index: usize, tool_use_id: &str) -> String {
    messages[..result_index]
        .iter()
        .rev()
        .find(|message| message.role == Role::Assistant)
        .and_then(|message| {
            message.blocks().iter().find_map(|block| match block {
                ContentBlock::ToolUse { id, name, .. } if id == tool_use_id => Some(name.clone()),
                _ => None,
            })
        })
        .unwrap_or_else(|| "tool".to_string())
}

/// Collapse whitespace runs and cap the length, ellipsis included.
fn normalize_failure(text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() <= TOOL_FAILURE_MAX_CHARS {
        return normalized;
    }
    let mut out: String = normalized.chars().take(TOOL_FAILURE_MAX_CHARS - 1).collect();
    out.push('…');
    out
}

/// Final summary text: model output, then tool failures, then file lists.
fn assemble_summary(
    model_output: &str,
    failures: &[ToolFailure],
    file_ops: &FileOperations,
) -> String {
    let mut out = model_output.trim().to_string();

    if !failures.is_empty() {
        out.push_str("\n\n## Tool Failures");
        for failure in failures.iter().take(MAX_TOOL_FAILURES) {
            out.push_str(&format!("\n- {}: {}", failure.name, failure.summary));
        }
        if failures.len() > MAX_TOOL_FAILURES {
            out.push_str(&format!("\n- …and {} more", failures.len() - MAX_TOOL_FAILURES));
        }
    }

    let read = file_ops.files_read();
    if !read.is_empty() {
        out.push_str(&format!("\n\n<read-files>\n{}\n</read-files>", read.join("\n")));
    }
    let modified = file_ops.files_modified();
    if !modified.is_empty() {
        out.push_str(&format!(
            "\n\n<modified-files>\n{}\n</modified-files>",
            modified.join("\n")
        ));
    }
    out
}
