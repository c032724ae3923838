//! threadrelay: relays chat-platform threads to an AI completion service.
//!
//! Inbound messages are classified, bound to a thread, assembled into a
//! role-tagged conversation, completed, chunked, and delivered back into the
//! same thread. A managed git checkout is kept in sync alongside.

pub mod agent;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod logging;
pub mod messaging;
pub mod redact;
pub mod repo;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message as delivered by the chat platform. Read-only to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub author_id: String,
    pub author_is_bot: bool,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub channel_id: String,
    /// Whether the message was posted inside a thread.
    pub is_thread: bool,
    /// User ids mentioned by the message.
    pub mentions: Vec<String>,
}

impl RawMessage {
    pub fn mentions_user(&self, user_id: &str) -> bool {
        self.mentions.iter().any(|id| id == user_id)
    }
}

/// Opaque reference to a platform thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadHandle {
    pub id: String,
    pub name: String,
}

/// A message the relay posted into a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    pub id: String,
    pub thread_id: String,
}

/// The relay's own identity on the platform, learned at login.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BotIdentity {
    pub user_id: String,
    pub username: String,
    /// Additional display name users address the bot by.
    pub alias: Option<String>,
}
