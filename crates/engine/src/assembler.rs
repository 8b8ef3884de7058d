//! Message window assembly.
//!
//! Builds the ordered, bounded message window for one completion turn
//! from up to five sources, in priority order:
//!
//! 1. system role
//! 2. database schema context (system message)
//! 3. prior session history, oldest first
//! 4. explicit caller messages
//! 5. the new prompt, as a user message
//!
//! The window never exceeds `max_length`; overflow is dropped from the
//! front (oldest first). A system role or prompt that already appears
//! in the window is skipped rather than double-counted, and the
//! returned values reflect what was actually used.

use crate::options::SliceHook;
use std::sync::Arc;
use tabletalk_core::database::Database;
use tabletalk_core::error::Error;
use tabletalk_core::message::{Message, Role};
use tabletalk_core::session::{SessionId, SessionStore};
use tracing::{debug, warn};

/// Inputs for one assembly pass.
pub struct AssembleRequest<'a> {
    pub session: Option<&'a SessionId>,
    pub system_role: Option<String>,
    pub prompt: Option<String>,
    pub messages: &'a [Message],
    pub load_history: bool,
    pub load_database_schema: bool,
    pub max_length: usize,
    pub on_slice: Option<&'a SliceHook>,
}

/// The assembled window plus the values actually used.
///
/// `prompt` / `system_role` come back cleared when deduplication or
/// truncation removed them — the caller must not persist or re-apply
/// a value that never made it into the window.
#[derive(Debug, Clone)]
pub struct AssembledWindow {
    pub messages: Vec<Message>,
    pub prompt: Option<String>,
    pub system_role: Option<String>,
    pub dropped: usize,
}

/// Stateless window builder over the optional collaborators.
pub struct MessageAssembler {
    store: Option<Arc<dyn SessionStore>>,
    database: Option<Arc<dyn Database>>,
}

impl MessageAssembler {
    pub fn new(
        store: Option<Arc<dyn SessionStore>>,
        database: Option<Arc<dyn Database>>,
    ) -> Self {
        Self { store, database }
    }

    /// Assemble the window for one turn.
    pub async fn assemble(&self, request: AssembleRequest<'_>) -> Result<AssembledWindow, Error> {
        let mut system_role_used = request.system_role;
        let mut prompt_used = request.prompt;

        // ── Schema context ────────────────────────────────────────────
        let schema_message = if request.load_database_schema {
            match &self.database {
                Some(database) => {
                    let description = database.describe_schema().await?;
                    Some(Message::system(description))
                }
                None => {
                    warn!("Schema context requested but no database configured");
                    None
                }
            }
        } else {
            None
        };

        // ── History, oldest first ─────────────────────────────────────
        let history = match (request.load_history, &self.store, request.session) {
            (true, Some(store), Some(session)) => {
                let mut recent = store.load_recent(session, request.max_length).await?;
                recent.reverse();
                recent
            }
            (true, _, _) => {
                warn!("History requested but no session store/session configured");
                Vec::new()
            }
            _ => Vec::new(),
        };

        // ── Candidates: history then explicit messages ────────────────
        let mut window: Vec<Message> = Vec::new();
        window.extend(history);
        window.extend(request.messages.iter().cloned());

        // A system role identical to the head of the window would count
        // the same instruction twice; skip re-adding it instead.
        let head_system = if let Some(role) = &system_role_used {
            let duplicate = window
                .first()
                .is_some_and(|m| m.role == Role::System && &m.content == role);
            if duplicate {
                system_role_used = None;
                None
            } else {
                Some(Message::system(role.clone()))
            }
        } else {
            None
        };

        // Same for the prompt: history may already end with this exact
        // user turn (e.g. a retried call).
        if let Some(prompt) = &prompt_used {
            let duplicate = window
                .last()
                .is_some_and(|m| m.role == Role::User && &m.content == prompt);
            if duplicate {
                prompt_used = None;
            } else {
                window.push(Message::user(prompt.clone()));
            }
        }

        if let Some(schema) = schema_message {
            window.insert(0, schema);
        }
        let system_role_in_window = head_system.is_some();
        if let Some(head) = head_system {
            window.insert(0, head);
        }

        // ── Enforce the window bound, oldest dropped first ────────────
        let mut dropped = 0;
        if window.len() > request.max_length {
            dropped = window.len() - request.max_length;
            window.drain(..dropped);

            if system_role_in_window {
                // The head system role is always the first casualty.
                system_role_used = None;
            }
            if window.is_empty() {
                prompt_used = None;
            }

            debug!(
                dropped,
                remaining = window.len(),
                "Window truncated to fit max length"
            );
            if let Some(hook) = request.on_slice {
                hook(dropped);
            }
        }

        Ok(AssembledWindow {
            messages: window,
            prompt: prompt_used,
            system_role: system_role_used,
            dropped,
        })
    }
}
