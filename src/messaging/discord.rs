//! Discord adapter built on serenity.

use crate::agent::orchestrator::{Orchestrator, OrchestratorDeps};
use crate::agent::status::StatusReporter;
use crate::error::{Error, Result};
use crate::llm::CompletionClient;
use crate::messaging::{ChatPlatform, ThreadLifecycle};
use crate::repo::RepoSync;
use crate::{BotIdentity, DeliveredMessage, RawMessage, ThreadHandle};

use chrono::{DateTime, Utc};
use serenity::all::{
    AutoArchiveDuration, Channel, ChannelId, Context, CreateThread, EventHandler, GatewayIntents,
    GetMessages, Http, Message, MessageId, Ready,
};
use std::sync::{Arc, OnceLock};

/// Milliseconds between the Unix epoch and the Discord epoch (2015-01-01).
const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;

/// Gateway intents the relay needs: guild channels, their messages, and
/// message content.
pub fn gateway_intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
}

/// REST side of the Discord integration.
#[derive(Clone)]
pub struct DiscordPlatform {
    http: Arc<Http>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

impl ChatPlatform for DiscordPlatform {
    fn name(&self) -> &str {
        "discord"
    }

    async fn create_thread(
        &self,
        message: &RawMessage,
        name: &str,
        auto_archive_minutes: u16,
    ) -> Result<ThreadHandle> {
        let channel = parse_channel_id(&message.channel_id)?;
        let anchor = parse_message_id(&message.id)?;
        let builder =
            CreateThread::new(name).auto_archive_duration(archive_duration(auto_archive_minutes));

        let thread = channel
            .create_thread_from_message(&*self.http, anchor, builder)
            .await
            .map_err(platform_error)?;

        Ok(ThreadHandle {
            id: thread.id.to_string(),
            name: thread.name,
        })
    }

    async fn fetch_messages(&self, thread: &ThreadHandle, limit: u8) -> Result<Vec<RawMessage>> {
        let channel = parse_channel_id(&thread.id)?;
        let messages = channel
            .messages(&*self.http, GetMessages::new().limit(limit))
            .await
            .map_err(platform_error)?;

        Ok(messages
            .iter()
            .map(|message| to_raw_message(message, true))
            .collect())
    }

    async fn send_message(&self, thread: &ThreadHandle, content: &str) -> Result<DeliveredMessage> {
        let channel = parse_channel_id(&thread.id)?;
        let sent = channel
            .say(&*self.http, content)
            .await
            .map_err(platform_error)?;

        Ok(DeliveredMessage {
            id: sent.id.to_string(),
            thread_id: thread.id.clone(),
        })
    }

    async fn send_typing(&self, thread: &ThreadHandle) -> Result<()> {
        let channel = parse_channel_id(&thread.id)?;
        channel
            .broadcast_typing(&*self.http)
            .await
            .map_err(platform_error)
    }
}

/// Gateway event handler. Learns the bot identity on `ready`, then hands
/// every human-authored message to the orchestrator.
pub struct RelayHandler {
    completion: CompletionClient,
    repo: Arc<dyn RepoSync>,
    status: Arc<StatusReporter>,
    max_history: usize,
    alias: Option<String>,
    orchestrator: OnceLock<Arc<Orchestrator>>,
}

impl RelayHandler {
    pub fn new(
        completion: CompletionClient,
        repo: Arc<dyn RepoSync>,
        status: Arc<StatusReporter>,
        max_history: usize,
        alias: Option<String>,
    ) -> Self {
        Self {
            completion,
            repo,
            status,
            max_history,
            alias,
            orchestrator: OnceLock::new(),
        }
    }

    fn build_orchestrator(&self, http: Arc<Http>, identity: BotIdentity) -> Arc<Orchestrator> {
        let deps = OrchestratorDeps {
            threads: ThreadLifecycle::new(Arc::new(DiscordPlatform::new(http))),
            completion: self.completion.clone(),
            repo: self.repo.clone(),
            status: self.status.clone(),
            max_history: self.max_history,
        };
        Arc::new(Orchestrator::new(deps, identity))
    }
}

#[serenity::async_trait]
impl EventHandler for RelayHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        let identity = BotIdentity {
            user_id: ready.user.id.to_string(),
            username: ready.user.name.clone(),
            alias: self.alias.clone(),
        };
        tracing::info!(
            user_id = %identity.user_id,
            username = %identity.username,
            guilds = ready.guilds.len(),
            "connected to Discord"
        );

        // Reconnects fire `ready` again; the first identity stays.
        self.orchestrator
            .get_or_init(|| self.build_orchestrator(ctx.http.clone(), identity));
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let Some(orchestrator) = self.orchestrator.get() else {
            tracing::debug!(message_id = %msg.id, "message received before ready, ignoring");
            return;
        };

        let is_thread = match msg.channel_id.to_channel(&ctx).await {
            Ok(Channel::Guild(channel)) => channel.thread_metadata.is_some(),
            Ok(_) => false,
            Err(error) => {
                tracing::warn!(channel_id = %msg.channel_id, %error, "failed to resolve channel");
                false
            }
        };

        let raw = to_raw_message(&msg, is_thread);
        if orchestrator.dispatch(raw).is_some() {
            tracing::debug!(
                message_id = %msg.id,
                channel_id = %msg.channel_id,
                is_thread,
                "accepted message"
            );
        }
    }
}

fn to_raw_message(message: &Message, is_thread: bool) -> RawMessage {
    RawMessage {
        id: message.id.to_string(),
        author_id: message.author.id.to_string(),
        author_is_bot: message.author.bot,
        content: message.content.clone(),
        created_at: snowflake_timestamp(message.id.get()),
        channel_id: message.channel_id.to_string(),
        is_thread,
        mentions: message
            .mentions
            .iter()
            .map(|user| user.id.to_string())
            .collect(),
    }
}

/// Creation time encoded in a Discord snowflake.
pub fn snowflake_timestamp(id: u64) -> DateTime<Utc> {
    let millis = (id >> 22) + DISCORD_EPOCH_MS;
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default()
}

fn parse_snowflake(id: &str) -> Result<u64> {
    id.parse::<u64>()
        .ok()
        .filter(|value| *value != 0)
        .ok_or_else(|| Error::Platform(format!("invalid Discord id: {id}")))
}

fn parse_channel_id(id: &str) -> Result<ChannelId> {
    parse_snowflake(id).map(ChannelId::new)
}

fn parse_message_id(id: &str) -> Result<MessageId> {
    parse_snowflake(id).map(MessageId::new)
}

fn archive_duration(minutes: u16) -> AutoArchiveDuration {
    match minutes {
        1440 => AutoArchiveDuration::OneDay,
        4320 => AutoArchiveDuration::ThreeDays,
        10080 => AutoArchiveDuration::OneWeek,
        _ => AutoArchiveDuration::OneHour,
    }
}

fn platform_error(error: serenity::Error) -> Error {
    Error::Platform(error.to_string())
}
