//! LLM provider transport for TableTalk.
//!
//! All providers implement the `tabletalk_core::Provider` trait.
//! Raw provider rejections are translated into the closed
//! `ProviderError` taxonomy in `classify` — the rest of the system
//! never matches on provider error text.

pub mod classify;
pub mod openai_compat;

pub use classify::classify_api_error;
pub use openai_compat::OpenAiCompatProvider;
