//! Session state for one request's processing lifetime.
//!
//! A session is rebuilt from the client's state at the start of a request,
//! advanced by exactly one inference step, and flattened back afterwards.

use chrono::{DateTime, Utc};

use parlors_core::{ChatMessage, Role};

use crate::checkpoint::SessionConfig;

/// A conversation session with its committed turn history.
///
/// `messages` alternate user and assistant turns starting with a user turn.
/// The system instruction is never part of it.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    /// Thread routing for the snapshot store
    pub config: SessionConfig,
    /// Committed turn history
    pub messages: Vec<ChatMessage>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ConversationSession {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let now = Utc::now();
        Self {
            config,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a session from plain turn texts, assigning roles by position.
    #[must_use]
    pub fn from_prompt_list(config: SessionConfig, prompt_list: &[String]) -> Self {
        let mut session = Self::new(config);
        session.messages = prompt_list
            .iter()
            .enumerate()
            .map(|(idx, text)| ChatMessage::new(Role::from_position(idx), text.clone()))
            .collect();
        session
    }

    #[must_use]
    pub fn thread_id(&self) -> &str {
        self.config.thread_id()
    }

    /// Add a message to the session.
    pub fn add_message(&mut self, role: Role, content: String) {
        self.messages.push(ChatMessage { role, content });
        self.updated_at = Utc::now();
    }

    /// Plain text of each turn, in order.
    #[must_use]
    pub fn prompt_list(&self) -> Vec<String> {
        self.messages.iter().map(|m| m.content.clone()).collect()
    }

    /// Get message count.
    #[must_use]
    pub const fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Check if session is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
