//! # TableTalk Core
//!
//! Domain types, traits, and error definitions for the TableTalk
//! chat completion engine. This crate has **zero framework
//! dependencies** — it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator is defined as a trait here. Implementations live
//! in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod database;
pub mod error;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use database::Database;
pub use error::{EngineError, Error, ProviderError, Result};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{
    CompletionRequest, CompletionResponse, Provider, StreamChunk, StreamReceiver, ToolCallDelta,
    ToolDefinition, Usage,
};
pub use session::{SessionId, SessionStore};
pub use tool::{Tool, ToolCall, ToolCallResult, ToolOutcome, ToolOutput, ToolRegistry};
