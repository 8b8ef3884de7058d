//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tabletalk_core::error::SessionError;
use tabletalk_core::message::Message;
use tabletalk_core::session::{SessionId, SessionStore};
use tokio::sync::RwLock;

/// An in-memory session store backed by a per-session Vec.
/// Useful for testing and sessions where persistence isn't needed.
pub struct InMemoryStore {
    sessions: Arc<RwLock<HashMap<SessionId, Vec<Message>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Total number of messages stored for a session.
    pub async fn len(&self, session: &SessionId) -> usize {
        self.sessions
            .read()
            .await
            .get(session)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Full history in append order (oldest first).
    pub async fn all(&self, session: &SessionId) -> Vec<Message> {
        self.sessions
            .read()
            .await
            .get(session)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, session: &SessionId, message: Message) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .entry(session.clone())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn load_recent(
        &self,
        session: &SessionId,
        limit: usize,
    ) -> Result<Vec<Message>, SessionError> {
        let sessions = self.sessions.read().await;
        let Some(messages) = sessions.get(session) else {
            return Ok(Vec::new());
        };
        Ok(messages.iter().rev().take(limit).cloned().collect())
    }

    async fn clear(&self, session: &SessionId) -> Result<(), SessionError> {
        self.sessions.write().await.remove(session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_and_load() {
        let store = InMemoryStore::new();
        let session = SessionId::from("s1");

        store.append(&session, Message::user("first")).await.unwrap();
        store
            .append(&session, Message::assistant("second"))
            .await
            .unwrap();

        let recent = store.load_recent(&session, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        // Most recent first
        assert_eq!(recent[0].content, "second");
        assert_eq!(recent[1].content, "first");
    }

    #[tokio::test]
    async fn load_respects_limit() {
        let store = InMemoryStore::new();
        let session = SessionId::from("s1");

        for i in 0..5 {
            store
                .append(&session, Message::user(format!("msg {i}")))
                .await
                .unwrap();
        }

        let recent = store.load_recent(&session, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "msg 4");
        assert_eq!(recent[1].content, "msg 3");
    }

    #[tokio::test]
    async fn unknown_session_is_empty() {
        let store = InMemoryStore::new();
        let recent = store
            .load_recent(&SessionId::from("nope"), 10)
            .await
            .unwrap();
        assert!(recent.is_empty());
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = InMemoryStore::new();
        let a = SessionId::from("a");
        let b = SessionId::from("b");

        store.append(&a, Message::user("for a")).await.unwrap();
        store.append(&b, Message::user("for b")).await.unwrap();

        let recent = store.load_recent(&a, 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "for a");
    }

    #[tokio::test]
    async fn clear_removes_history() {
        let store = InMemoryStore::new();
        let session = SessionId::from("s1");

        store.append(&session, Message::user("gone")).await.unwrap();
        store.clear(&session).await.unwrap();
        assert_eq!(store.len(&session).await, 0);
    }
}
