//! The turn loop
//!
//! One turn: append the user input, then loop until the model stops with
//! text. Each iteration reloads identity, rebuilds the system prompt,
//! recomputes the budget, selects a transcript tail (compacting on
//! overflow), calls the model, persists its message, and dispatches any
//! tool calls.
//!
//! Everything the model produces is persisted before the loop acts on it;
//! that ordering is what makes crash recovery work.

use crate::error::AgentError;
use chrono::Utc;
use komatachi_core::{
    build_system_prompt, estimate_message_tokens, estimate_string_tokens, execute_tool,
    load_identity_files, select_messages, ContentBlock, FileOperations, Message, ModelClient,
    ModelRequest, StopReason, ToolRegistry,
};
use komatachi_store::ConversationStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Model calls allowed per turn. Exceeding this suggests an infinite tool loop.
pub const MAX_MODEL_CALLS_PER_TURN: u32 = 25;

/// Compactions allowed per turn before the turn gives up.
pub const MAX_COMPACTIONS_PER_TURN: u32 = 2;

/// Static configuration for an agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    pub max_tokens: u32,
    pub context_window: u64,
    /// Root of the identity files, reloaded every loop iteration.
    pub home_dir: PathBuf,
    pub max_model_calls: u32,
    pub max_compactions: u32,
}

impl AgentConfig {
    pub fn new(
        model: impl Into<String>,
        max_tokens: u32,
        context_window: u64,
        home_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            context_window,
            home_dir: home_dir.into(),
            max_model_calls: MAX_MODEL_CALLS_PER_TURN,
            max_compactions: MAX_COMPACTIONS_PER_TURN,
        }
    }
}

/// The persistent conversational entity's runtime: one agent, one process,
/// one indefinitely-growing conversation.
pub struct Agent<M: ModelClient + ?Sized> {
    pub(crate) config: AgentConfig,
    pub(crate) client: Arc<M>,
    tools: ToolRegistry,
    pub(crate) store: ConversationStore,
    /// File side-effects reported by tools. Currently always empty: tools
    /// have no reporting channel yet, but compaction already formats these.
    pub(crate) file_ops: FileOperations,
}

impl<M: ModelClient + ?Sized> Agent<M> {
    pub fn new(
        config: AgentConfig,
        client: Arc<M>,
        tools: ToolRegistry,
        store: ConversationStore,
    ) -> Self {
        Self {
            config,
            client,
            tools,
            store,
            file_ops: FileOperations::default(),
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Run one turn to completion and return the model's final text.
    pub async fn process_turn(&mut self, user_input: &str) -> Result<String, AgentError> {
        self.store.append_message(&Message::user(user_input))?;

        let mut model_calls = 0u32;
        let mut compaction_attempts = 0u32;

        loop {
            // Identity edits take effect here, on every iteration.
            let identity = load_identity_files(&self.config.home_dir).map_err(|source| {
                AgentError::Identity {
                    path: self.config.home_dir.clone(),
                    source,
                }
            })?;
            let system_prompt =
                build_system_prompt(&identity, &self.tools.definitions(), Utc::now());

            let prompt_tokens = estimate_string_tokens(&system_prompt);
            let available = self.config.context_window as i64
                - prompt_tokens as i64
                - i64::from(self.config.max_tokens);
            if available <= 0 {
                return Err(AgentError::TokenBudgetExhausted {
                    context_window: self.config.context_window,
                    prompt_tokens,
                    max_tokens: self.config.max_tokens,
                });
            }
            let budget = available as u64;

            let selected = loop {
                let (selected, overflow) = {
                    let messages = self.store.messages()?;
                    let selection = select_messages(messages, budget, estimate_message_tokens);
                    (selection.selected.to_vec(), selection.overflow)
                };
                let Some(overflow) = overflow else {
                    break selected;
                };
                if compaction_attempts >= self.config.max_compactions {
                    return Err(AgentError::CompactionExhausted {
                        attempts: compaction_attempts,
                        dropped_count: overflow.dropped_count,
                        dropped_tokens: overflow.estimated_dropped_tokens,
                    });
                }
                compaction_attempts += 1;
                tracing::info!(
                    dropped = overflow.dropped_count,
                    attempt = compaction_attempts,
                    "context overflow, compacting"
                );
                self.compact(budget, identity.soul.as_deref()).await?;
            };

            if model_calls >= self.config.max_model_calls {
                return Err(AgentError::TurnBudgetExhausted {
                    limit: self.config.max_model_calls,
                });
            }
            model_calls += 1;

            tracing::debug!(
                call = model_calls,
                messages = selected.len(),
                "calling model"
            );
            let response = self
                .client
                .complete(ModelRequest {
                    model: self.config.model.clone(),
                    system: system_prompt,
                    messages: selected,
                    tools: self.tools.definitions(),
                    max_tokens: self.config.max_tokens,
                })
                .await
                .map_err(AgentError::ModelCall)?;

            // The entire content array, tool_use blocks included. This is
            // what makes recovery possible.
            self.store
                .append_message(&Message::assistant(response.content.clone()))?;

            match response.stop_reason {
                StopReason::EndTurn | StopReason::MaxTokens => return Ok(response.text()),
                StopReason::ToolUse => {
                    let results = self.dispatch_tools(&response.content).await;
                    self.store.append_message(&Message::tool_results(results))?;
                }
            }
        }
    }

    /// Execute every tool_use block serially, in order, and return results
    /// in the same order. Failures become `is_error` results, never errors.
    async fn dispatch_tools(&self, content: &[ContentBlock]) -> Vec<ContentBlock> {
        let mut results = Vec::new();
        for block in content {
            let ContentBlock::ToolUse { id, name, input } = block else {
                continue;
            };
            match self.tools.find(name) {
                None => {
                    tracing::warn!(tool = %name, "tool not found");
                    results.push(ContentBlock::tool_result_error(
                        id.clone(),
                        format!("Tool not found: {name}"),
                    ));
                }
                Some(tool) => {
                    let executed = execute_tool(tool, input.clone()).await;
                    tracing::debug!(tool = %name, is_error = executed.is_error, "tool executed");
                    results.push(if executed.is_error {
                        ContentBlock::tool_result_error(id.clone(), executed.content)
                    } else {
                        ContentBlock::tool_result(id.clone(), executed.content)
                    });
                }
            }
        }
        results
    }
}
