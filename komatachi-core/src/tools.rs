//! Tool registry and dispatch contract
//!
//! The registry is a flat list: the sequence is the policy. Handlers are
//! owned by whoever constructed the registry; the turn loop only borrows
//! them, and a handler failure is data, never a propagated error.

use crate::types::ToolDef;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Error returned by a tool handler.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

/// A tool implementation, owned by the host.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, input: Value) -> Result<String, ToolError>;
}

/// A tool: the wire-visible contract plus its handler.
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub handler: Arc<dyn ToolHandler>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler,
        }
    }

    /// Wire form for the model API; the handler is dropped.
    pub fn definition(&self) -> ToolDef {
        ToolDef {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Outcome of executing a tool. Always produced, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedTool {
    pub content: String,
    pub is_error: bool,
}

/// Flat, ordered tool list.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Tool>) -> Self {
        Self { tools }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Export every tool in wire form, in registry order.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools.iter().map(Tool::definition).collect()
    }

    /// Case-sensitive linear lookup; first match wins on duplicates.
    pub fn find(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|tool| tool.name == name)
    }
}

/// Invoke a tool handler, converting any failure into an error result.
///
/// The turn loop never sees a handler error surface as anything but an
/// `is_error` outcome.
pub async fn execute_tool(tool: &Tool, input: Value) -> ExecutedTool {
    match tool.handler.invoke(input).await {
        Ok(content) => ExecutedTool {
            content,
            is_error: false,
        },
        Err(err) => ExecutedTool {
            content: err.to_string(),
            is_error: true,
        },
    }
}
