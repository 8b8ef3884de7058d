//! TableTalk completion engine.
//!
//! Orchestrates the full life of one chat turn: window assembly,
//! provider calls (batched or streamed), tool-call resolution with
//! bounded recursion, payload-too-large recovery, and session
//! persistence.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabletalk_engine::{ChatEngine, CompletionOptions};
//! # async fn example(provider: Arc<dyn tabletalk_core::Provider>) -> tabletalk_core::Result<()> {
//! let engine = ChatEngine::new(provider, tabletalk_config::EngineConfig::default());
//! let completion = engine
//!     .create_chat_completion(None, CompletionOptions::prompt("What is 2+2?"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod engine;
pub mod options;
pub mod retry;
pub mod rounds;
pub mod stream;

pub use assembler::{AssembleRequest, AssembledWindow, MessageAssembler};
pub use engine::ChatEngine;
pub use options::{
    ChatCompletion, CompletionChunk, CompletionContent, CompletionOptions, CompletionStream,
    LengthErrorHook, SliceHook, ToolCallHook, ToolResultHook,
};
pub use retry::RetryController;
pub use rounds::ToolCallResolver;
pub use stream::{AggregatedResponse, StreamAggregator};
