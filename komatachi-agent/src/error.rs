//! Turn-level errors
//!
//! A failed turn leaves the user message on disk (input is never lost) but
//! attempts no partial recovery. Every variant carries enough context to
//! render the protocol's `<kind>: <detail>` error frame.

use komatachi_core::ModelError;
use komatachi_store::StoreError;
use std::io;
use std::path::PathBuf;

/// Errors from `Agent::process_turn`.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("identity files unreadable under {path}: {source}")]
    Identity {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("model call failed: {0}")]
    ModelCall(#[source] ModelError),

    #[error(
        "token budget exhausted: context window {context_window} cannot fit the system prompt \
         ({prompt_tokens} tokens) plus {max_tokens} response tokens"
    )]
    TokenBudgetExhausted {
        context_window: u64,
        prompt_tokens: u64,
        max_tokens: u32,
    },

    #[error("compaction input too large: {input_tokens} tokens exceeds the summarizer limit of {limit}")]
    CompactionInputTooLarge { input_tokens: u64, limit: u64 },

    #[error(
        "still over budget after {attempts} compactions: {dropped_count} messages \
         (~{dropped_tokens} tokens) do not fit"
    )]
    CompactionExhausted {
        attempts: u32,
        dropped_count: usize,
        dropped_tokens: u64,
    },

    #[error("model call budget exhausted: more than {limit} calls in one turn")]
    TurnBudgetExhausted { limit: u32 },
}

impl AgentError {
    /// Stable kind string for protocol error frames.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Store(err) => err.kind(),
            Self::Identity { .. } => "IO",
            Self::ModelCall(_) => "ModelCallError",
            Self::TokenBudgetExhausted { .. } => "TokenBudgetExhausted",
            Self::CompactionInputTooLarge { .. } => "InputTooLarge",
            Self::CompactionExhausted { .. } => "CompactionExhausted",
            Self::TurnBudgetExhausted { .. } => "TurnBudgetExhausted",
        }
    }
}
