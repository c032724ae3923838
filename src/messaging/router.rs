//! Inbound message classification.

use crate::RawMessage;

/// What an accepted message asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Status,
    Chat,
}

/// A classified inbound message, consumed once by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub content: String,
    pub source: RawMessage,
}

/// Decide whether `message` is for the bot with id `bot_user_id`, and what
/// it asks for.
///
/// Bot-authored messages are never accepted. Outside threads the bot must be
/// mentioned. Content containing `status` (any case) is a status request;
/// everything else is chat.
pub fn route(message: &RawMessage, bot_user_id: &str) -> Option<Command> {
    if message.author_is_bot {
        return None;
    }
    if !message.is_thread && !message.mentions_user(bot_user_id) {
        return None;
    }

    let kind = if message.content.trim().to_lowercase().contains("status") {
        CommandKind::Status
    } else {
        CommandKind::Chat
    };

    Some(Command {
        kind,
        content: message.content.clone(),
        source: message.clone(),
    })
}
