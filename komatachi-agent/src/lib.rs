//! komatachi-agent - Turn orchestration and compaction
//!
//! Composes the core contracts with the conversation store: append user
//! input, reload identity, select within budget, call the model, dispatch
//! tools, and compact the transcript when it outgrows the context window.

mod compact;
mod error;
mod turn;

pub use compact::SUMMARY_PREFIX;
pub use error::AgentError;
pub use turn::{Agent, AgentConfig, MAX_COMPACTIONS_PER_TURN, MAX_MODEL_CALLS_PER_TURN};
