//! Caller-facing options and result types for completion calls.

use std::sync::Arc;
use tabletalk_core::error::{Error, ProviderError};
use tabletalk_core::message::Message;
use tabletalk_core::tool::{Tool, ToolCall, ToolCallResult};
use tabletalk_core::provider::Usage;

/// Observability hook invoked before each tool execution.
pub type ToolCallHook = Arc<dyn Fn(&ToolCall) + Send + Sync>;

/// Observability hook invoked after each tool execution.
pub type ToolResultHook = Arc<dyn Fn(&ToolCallResult) + Send + Sync>;

/// Hook invoked when the assembler drops messages to fit the window;
/// receives the number of dropped messages.
pub type SliceHook = Arc<dyn Fn(usize) + Send + Sync>;

/// Hook invoked when the provider rejects the payload on length
/// grounds; receives the classified error before it is handled.
pub type LengthErrorHook = Arc<dyn Fn(&ProviderError) + Send + Sync>;

/// Options for one `create_chat_completion` call.
///
/// Everything is optional; unset fields fall back to the engine
/// configuration defaults.
#[derive(Clone, Default)]
pub struct CompletionOptions {
    /// The new user prompt for this turn
    pub prompt: Option<String>,

    /// System role content for this turn (default from config)
    pub system_role: Option<String>,

    /// Stream the response instead of returning one final value
    pub stream: bool,

    /// Explicit messages appended after history
    pub messages: Vec<Message>,

    /// Per-call tools, layered over the engine registry (last wins)
    pub tools: Vec<Arc<dyn Tool>>,

    /// Model override
    pub model: Option<String>,

    /// Temperature override
    pub temperature: Option<f32>,

    /// Load prior session history into the window
    pub load_history: bool,

    /// Inject the database schema description as context
    pub load_database_schema: bool,

    /// Maximum number of messages in the assembled window
    pub max_messages_length: Option<usize>,

    /// Invoked when the window was truncated during assembly
    pub on_messages_length_slice: Option<SliceHook>,

    /// Invoked before each tool execution
    pub on_tool_call: Option<ToolCallHook>,

    /// Invoked after each tool execution
    pub on_tool_call_result: Option<ToolResultHook>,

    /// Invoked when a single message exceeds the provider limit (fatal)
    pub on_message_length_exceeded: Option<LengthErrorHook>,

    /// Invoked before each automatic window-too-long retry
    pub on_messages_length_exceeded: Option<LengthErrorHook>,
}

impl CompletionOptions {
    /// Options for a plain prompt turn.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            prompt: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_system_role(mut self, role: impl Into<String>) -> Self {
        self.system_role = Some(role.into());
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_history(mut self, load: bool) -> Self {
        self.load_history = load;
        self
    }

    pub fn with_database_schema(mut self, load: bool) -> Self {
        self.load_database_schema = load;
        self
    }

    pub fn with_max_messages_length(mut self, max: usize) -> Self {
        self.max_messages_length = Some(max);
        self
    }
}

impl std::fmt::Debug for CompletionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionOptions")
            .field("prompt", &self.prompt)
            .field("system_role", &self.system_role)
            .field("stream", &self.stream)
            .field("messages", &self.messages.len())
            .field("tools", &self.tools.len())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("load_history", &self.load_history)
            .field("load_database_schema", &self.load_database_schema)
            .field("max_messages_length", &self.max_messages_length)
            .finish()
    }
}

/// One content fragment of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionChunk {
    pub content: String,
}

/// The receiver half of a caller-facing completion stream.
///
/// Forward-only and single-pass; dropping it cancels further
/// forwarding (already-dispatched tool calls still run to completion).
pub type CompletionStream = tokio::sync::mpsc::Receiver<Result<CompletionChunk, Error>>;

/// A finished non-streaming completion.
#[derive(Debug, Clone)]
pub struct CompletionContent {
    /// The final assistant content
    pub content: String,

    /// Usage from the terminal provider round, when reported
    pub usage: Option<Usage>,
}

/// The result of `create_chat_completion`: one response object or one
/// chunk stream, never both.
#[derive(Debug)]
pub enum ChatCompletion {
    Content(CompletionContent),
    Stream(CompletionStream),
}

impl ChatCompletion {
    /// Unwrap the non-streaming result.
    pub fn into_content(self) -> Option<CompletionContent> {
        match self {
            Self::Content(content) => Some(content),
            Self::Stream(_) => None,
        }
    }

    /// Unwrap the streaming result.
    pub fn into_stream(self) -> Option<CompletionStream> {
        match self {
            Self::Content(_) => None,
            Self::Stream(stream) => Some(stream),
        }
    }
}
