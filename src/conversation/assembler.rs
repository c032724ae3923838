//! Turns raw thread history into an alternating, user-terminated conversation.

use crate::conversation::{ConversationTurn, Role};
use crate::{BotIdentity, RawMessage};

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static NAME_MENTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\w+").expect("hardcoded name mention regex"));

/// A history entry reduced to what assembly needs.
struct SourceMessage<'a> {
    created_at: DateTime<Utc>,
    from_bot: bool,
    content: &'a str,
}

/// Builds completion-ready conversations for one bot identity.
#[derive(Debug, Clone)]
pub struct ConversationAssembler {
    identity: BotIdentity,
    self_mention: Regex,
}

impl ConversationAssembler {
    pub fn new(identity: BotIdentity) -> Self {
        let self_mention = Regex::new(&format!("<@!?{}>", regex::escape(&identity.user_id)))
            .expect("escaped user id always forms a valid regex");
        Self {
            identity,
            self_mention,
        }
    }

    pub fn identity(&self) -> &BotIdentity {
        &self.identity
    }

    /// Assemble `history` plus the new message into completion turns.
    ///
    /// At most `max_history` source messages (the most recent, including the
    /// new one) are considered. The result is empty or strictly alternates
    /// roles and ends on a user turn.
    pub fn assemble(
        &self,
        history: &[RawMessage],
        new_message: &str,
        max_history: usize,
    ) -> Vec<ConversationTurn> {
        let mut sources: Vec<SourceMessage<'_>> = history
            .iter()
            .map(|message| SourceMessage {
                created_at: message.created_at,
                from_bot: message.author_is_bot,
                content: &message.content,
            })
            .chain(std::iter::once(SourceMessage {
                created_at: Utc::now(),
                from_bot: false,
                content: new_message,
            }))
            .collect();

        // Stable: equal timestamps keep platform order.
        sources.sort_by_key(|source| source.created_at);

        let start = sources.len().saturating_sub(max_history);

        let merged = sources[start..]
            .iter()
            .filter_map(|source| {
                let cleaned = self.clean(source.content);
                if cleaned.is_empty() {
                    return None;
                }
                let role = if source.from_bot {
                    Role::Assistant
                } else {
                    Role::User
                };
                Some(ConversationTurn {
                    role,
                    content: cleaned,
                })
            })
            .fold(Vec::new(), merge_turn);

        trim_trailing_assistant(merged)
    }

    /// Strip self-mentions and bot-name mentions, then trim.
    fn clean(&self, content: &str) -> String {
        let without_id = self.self_mention.replace_all(content, "");
        let without_names = NAME_MENTION_REGEX.replace_all(&without_id, |captures: &regex::Captures<'_>| {
            let mention = &captures[0];
            if self.names_bot(mention) {
                String::new()
            } else {
                mention.to_string()
            }
        });
        without_names.trim().to_string()
    }

    /// Whole-name, case-insensitive match against the username or alias.
    fn names_bot(&self, mention: &str) -> bool {
        let name = mention.trim_start_matches('@').to_lowercase();
        std::iter::once(self.identity.username.as_str())
            .chain(self.identity.alias.as_deref())
            .filter(|candidate| !candidate.is_empty())
            .any(|candidate| candidate.to_lowercase() == name)
    }
}

fn merge_turn(mut turns: Vec<ConversationTurn>, turn: ConversationTurn) -> Vec<ConversationTurn> {
    match turns.last_mut() {
        Some(last) if last.role == turn.role => {
            last.content.push('\n');
            last.content.push_str(&turn.content);
        }
        _ => turns.push(turn),
    }
    turns
}

fn trim_trailing_assistant(mut turns: Vec<ConversationTurn>) -> Vec<ConversationTurn> {
    while turns.last().is_some_and(|turn| turn.role == Role::Assistant) {
        turns.pop();
    }
    turns
}
