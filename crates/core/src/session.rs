//! SessionStore trait — durable conversation history.
//!
//! A session is an ordered, append-only history of messages owned by
//! the store. The engine persists exactly two messages per completed
//! turn (the user prompt and the final assistant content) and loads
//! prior turns when history is requested.

use crate::error::SessionError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The core SessionStore trait.
///
/// Implementations: SQLite (durable), in-memory (tests, ephemeral).
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The store name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Append one message to the session history.
    async fn append(
        &self,
        session: &SessionId,
        message: Message,
    ) -> std::result::Result<(), SessionError>;

    /// Load up to `limit` messages, most recent first.
    async fn load_recent(
        &self,
        session: &SessionId,
        limit: usize,
    ) -> std::result::Result<Vec<Message>, SessionError>;

    /// Delete a session and its history.
    async fn clear(&self, session: &SessionId) -> std::result::Result<(), SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_roundtrip() {
        let id = SessionId::from("sess-42");
        assert_eq!(id.to_string(), "sess-42");
    }

    #[test]
    fn fresh_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
