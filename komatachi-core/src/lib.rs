//! komatachi-core - Core types and logic for the Komatachi entity runtime
//!
//! Everything here is either pure (token estimation, context selection,
//! prompt assembly) or a contract the host fills in (tool handlers, the
//! model client). Persistence lives in `komatachi-store`; orchestration in
//! `komatachi-agent`.

pub mod client;
pub mod context;
pub mod identity;
pub mod tokens;
pub mod tools;
pub mod types;

pub use client::{ModelClient, ModelError, ModelRequest, ModelResponse};
pub use context::{select_messages, Overflow, Selection};
pub use identity::{build_system_prompt, load_identity_files, IdentityFiles};
pub use tokens::{estimate_message_tokens, estimate_string_tokens};
pub use tools::{execute_tool, ExecutedTool, Tool, ToolError, ToolHandler, ToolRegistry};
pub use types::{
    ContentBlock, ConversationMetadata, FileOperations, Message, MessageContent, MetadataPatch,
    Role, StopReason, ToolDef, ToolResultContent,
};
