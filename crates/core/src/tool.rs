//! Tool trait and registry — the abstraction over model-callable functions.
//!
//! Tools are what let the model act through the caller: query a table,
//! look up external data, run a computation. The engine advertises the
//! registered definitions to the provider and executes the calls the
//! model requests.

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A parsed request to execute a tool.
///
/// Ephemeral — scoped to one resolution round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the provider's tool_call id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a parsed JSON value
    pub arguments: serde_json::Value,
}

/// The value a tool executor produces on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The text content fed back to the provider
    pub content: String,

    /// Optional structured data for the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            data: None,
        }
    }
}

/// The outcome of one tool call — exactly one per call, correlated by id.
///
/// Executor failures are captured here rather than thrown; the error
/// text is what the provider sees in the follow-up tool message.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    /// The call ID this result answers
    pub call_id: String,

    /// Which tool ran
    pub name: String,

    /// The parsed arguments the tool ran with
    pub arguments: serde_json::Value,

    /// Value or serialized error
    pub outcome: ToolOutcome,
}

/// Success or captured failure of a tool execution.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Value(ToolOutput),
    Error(String),
}

impl ToolCallResult {
    /// The provider-safe text form of this result.
    pub fn content(&self) -> &str {
        match &self.outcome {
            ToolOutcome::Value(output) => &output.content,
            ToolOutcome::Error(text) => text,
        }
    }

    /// Whether the execution succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Value(_))
    }
}

/// The core Tool trait.
///
/// Each tool implements this trait and is registered in a
/// [`ToolRegistry`] to become available to completion calls.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "get_weather").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, name-unique.
///
/// The engine uses this to advertise definitions to the provider and
/// to look up executors when the model requests calls. Registries are
/// cheap to clone; merging two registries keeps the later registration
/// for any shared name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Register every tool in the iterator, last wins per name.
    pub fn register_all(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) {
        for tool in tools {
            self.register(tool);
        }
    }

    /// A new registry with `other`'s tools layered on top of this one.
    pub fn merged_with(&self, other: &ToolRegistry) -> ToolRegistry {
        let mut merged = self.clone();
        for tool in other.tools.values() {
            merged.register(Arc::clone(tool));
        }
        merged
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Whether any tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}
