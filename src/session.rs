//! Per-session conversation history.
//!
//! History is keyed strictly by session id; turns from one session are
//! never visible to another. Requests for the same session are serialized
//! through the per-session async mutex handed out by the registry, so
//! appends happen in request order and history can never interleave.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, append-only turn history for one session.
///
/// No size bound is enforced; a long-lived session grows without limit,
/// which is an accepted limitation of the current design.
#[derive(Debug, Default, Clone)]
pub struct ConversationSession {
    turns: Vec<Turn>,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn at the end of the history.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The history in arrival order.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Session-id keyed map of conversations.
///
/// The outer map is guarded by a fast blocking mutex (lookups are cheap);
/// each session carries its own `tokio` mutex which request handlers hold
/// for the duration of a request to serialize same-session traffic.
#[derive(Default)]
pub struct ConversationRegistry {
    sessions: Mutex<HashMap<String, Arc<tokio::sync::Mutex<ConversationSession>>>>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `id`, creating it on first use.
    pub fn session(&self, id: &str) -> Arc<tokio::sync::Mutex<ConversationSession>> {
        self.sessions
            .lock()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(ConversationSession::new())))
            .clone()
    }

    /// Number of sessions seen so far.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
