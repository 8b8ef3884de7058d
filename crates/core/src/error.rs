//! Error types for the TableTalk domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all TableTalk operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Session store errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Database errors ---
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    // --- Completion engine errors ---
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    /// A single message's content alone exceeds the provider limit.
    /// Fatal — shrinking the window cannot help.
    #[error("Message length {length} exceeds the provider maximum {max_length}")]
    MessageTooLong {
        length: usize,
        max_length: usize,
        message: String,
    },

    /// The aggregate message window exceeds the provider limit.
    /// Recoverable — the engine retries with a window of `max_length`.
    #[error("Messages window length {length} exceeds the provider maximum {max_length}")]
    ContextWindowExceeded {
        length: usize,
        max_length: usize,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Schema description unavailable: {0}")]
    SchemaUnavailable(String),
}

/// Errors raised by the completion engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The provider returned a tool call the engine cannot execute:
    /// unparsable arguments or a missing function reference.
    /// Aborts the turn — nothing is persisted.
    #[error("Malformed tool call {call_id}: {reason}")]
    MalformedToolCall { call_id: String, reason: String },

    /// The provider requested a tool that is not registered.
    #[error("Unknown tool requested: {name} (call {call_id})")]
    UnknownTool { call_id: String, name: String },

    /// The model kept requesting tools past the configured round limit.
    #[error("Tool resolution did not terminate within {rounds} rounds")]
    ToolRoundsExceeded { rounds: usize },

    /// Window-too-long retries were exhausted without the provider
    /// accepting a smaller window.
    #[error("Window length retries exhausted after {attempts} attempts")]
    LengthRetriesExhausted { attempts: usize },
}
