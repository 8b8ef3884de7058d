//! Streamed-delta reassembly.
//!
//! Providers emit raw deltas: content fragments interleaved with
//! tool-call fragments that may split a single call's JSON arguments
//! across many chunks. The aggregator forwards content as it arrives
//! and buffers tool-call fragments by slot index until the stream
//! ends, at which point the buffered slots are assembled into complete
//! calls for the resolver.

use std::collections::BTreeMap;
use tabletalk_core::error::EngineError;
use tabletalk_core::message::MessageToolCall;
use tabletalk_core::provider::{StreamChunk, ToolCallDelta, Usage};
use tracing::trace;

/// One tool call under reassembly, keyed by its slot index.
#[derive(Debug, Default, Clone)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// The assembled outcome of one provider stream.
#[derive(Debug, Clone)]
pub struct AggregatedResponse {
    /// All content fragments, concatenated in arrival order
    pub content: String,

    /// Completed tool calls in slot-index order (empty when the
    /// stream was a plain answer)
    pub tool_calls: Vec<MessageToolCall>,

    /// Usage from the final chunk, when the provider reported it
    pub usage: Option<Usage>,
}

/// Accumulates one provider stream into an [`AggregatedResponse`].
///
/// Indices may be sparse and fragments may arrive for several slots
/// interleaved; a `BTreeMap` keeps slots ordered without assuming
/// contiguity.
#[derive(Debug, Default)]
pub struct StreamAggregator {
    content: String,
    partial: BTreeMap<u32, PartialToolCall>,
    usage: Option<Usage>,
    done: bool,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk in. Returns the content fragment to forward to
    /// the caller, if the chunk carried one.
    pub fn apply(&mut self, chunk: StreamChunk) -> Option<String> {
        for delta in chunk.tool_call_deltas {
            self.apply_delta(delta);
        }
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }
        if chunk.done {
            self.done = true;
        }

        match chunk.content {
            Some(fragment) if !fragment.is_empty() => {
                self.content.push_str(&fragment);
                Some(fragment)
            }
            _ => None,
        }
    }

    fn apply_delta(&mut self, delta: ToolCallDelta) {
        let slot = self.partial.entry(delta.index).or_default();
        if delta.id.is_some() {
            slot.id = delta.id;
        }
        if delta.name.is_some() {
            slot.name = delta.name;
        }
        if let Some(fragment) = delta.arguments {
            slot.arguments.push_str(&fragment);
        }
        trace!(index = delta.index, "Buffered tool call fragment");
    }

    /// Whether the terminal chunk has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Whether any tool-call fragments were buffered.
    pub fn has_tool_calls(&self) -> bool {
        !self.partial.is_empty()
    }

    /// Assemble the buffered state into a complete response.
    ///
    /// A slot that never received an id or a name cannot be executed
    /// or answered; that is a malformed call and aborts the turn.
    pub fn finish(self) -> Result<AggregatedResponse, EngineError> {
        let mut tool_calls = Vec::with_capacity(self.partial.len());
        for (index, slot) in self.partial {
            let id = slot.id.ok_or_else(|| EngineError::MalformedToolCall {
                call_id: format!("slot {index}"),
                reason: "stream ended without a call id".into(),
            })?;
            let name = match slot.name {
                Some(name) if !name.is_empty() => name,
                _ => {
                    return Err(EngineError::MalformedToolCall {
                        call_id: id,
                        reason: "stream ended without a tool name".into(),
                    });
                }
            };
            tool_calls.push(MessageToolCall {
                id,
                name,
                arguments: slot.arguments,
            });
        }

        Ok(AggregatedResponse {
            content: self.content,
            tool_calls,
            usage: self.usage,
        })
    }
}
