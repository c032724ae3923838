//! Orchestrator: drives one inbound command from routing to delivery.

use crate::agent::status::StatusReporter;
use crate::conversation::ConversationAssembler;
use crate::error::{CompletionError, CompletionErrorKind};
use crate::llm::CompletionClient;
use crate::messaging::router::{self, Command, CommandKind};
use crate::messaging::threads::{HISTORY_FETCH_LIMIT, ThreadLifecycle};
use crate::repo::RepoSync;
use crate::{BotIdentity, RawMessage, ThreadHandle};

use std::sync::Arc;

/// Collaborators shared by every command. Cheap to clone.
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub threads: ThreadLifecycle,
    pub completion: CompletionClient,
    pub repo: Arc<dyn RepoSync>,
    pub status: Arc<StatusReporter>,
    /// Maximum source messages per conversation.
    pub max_history: usize,
}

/// Sequences routing, thread resolution, repository sync, assembly,
/// completion, and delivery for a single bot identity.
pub struct Orchestrator {
    deps: OrchestratorDeps,
    assembler: ConversationAssembler,
}

impl Orchestrator {
    pub fn new(deps: OrchestratorDeps, identity: BotIdentity) -> Self {
        Self {
            deps,
            assembler: ConversationAssembler::new(identity),
        }
    }

    pub fn identity(&self) -> &BotIdentity {
        self.assembler.identity()
    }

    /// Route `message` and, when accepted, process it on its own task.
    ///
    /// Errors and panics inside the task are logged and never escape, so a
    /// failing message cannot affect the next one. Returns `None` when the
    /// message is not for the bot.
    pub fn dispatch(self: &Arc<Self>, message: RawMessage) -> Option<tokio::task::JoinHandle<()>> {
        let command = router::route(&message, &self.identity().user_id)?;
        let message_id = message.id;
        let kind = command.kind;

        tracing::debug!(%message_id, ?kind, "dispatching command");

        let orchestrator = Arc::clone(self);
        let task = tokio::spawn(async move { orchestrator.handle(command).await });

        Some(tokio::spawn(async move {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::error!(%message_id, ?kind, %error, "command failed");
                }
                Err(join_error) if join_error.is_panic() => {
                    tracing::error!(%message_id, ?kind, "command task panicked");
                }
                Err(join_error) => {
                    tracing::warn!(%message_id, ?kind, %join_error, "command task cancelled");
                }
            }
        }))
    }

    /// Process one command. Failures with a thread to report into are
    /// reported there and count as handled.
    pub async fn handle(&self, command: Command) -> crate::Result<()> {
        let resolved = self.deps.threads.resolve_thread(&command.source).await?;

        match command.kind {
            CommandKind::Status => self.respond_status(&resolved.handle).await,
            CommandKind::Chat => {
                self.respond_chat(&command, &resolved.handle, resolved.created)
                    .await
            }
        }
    }

    async fn respond_status(&self, thread: &ThreadHandle) -> crate::Result<()> {
        let text = match self.deps.status.report().await {
            Ok(report) => report,
            Err(error) => {
                tracing::error!(thread_id = %thread.id, %error, "status report failed");
                format!("Status error: {error}")
            }
        };
        self.deps.threads.deliver(thread, &text).await?;
        Ok(())
    }

    async fn respond_chat(
        &self,
        command: &Command,
        thread: &ThreadHandle,
        new_thread: bool,
    ) -> crate::Result<()> {
        self.deps.threads.send_typing(thread).await;

        // Only the first message of a conversation triggers a sync.
        if new_thread {
            self.sync_repository(thread).await;
        }

        let history = match self
            .deps
            .threads
            .fetch_history(thread, HISTORY_FETCH_LIMIT)
            .await
        {
            Ok(history) => history,
            Err(error) => {
                tracing::error!(thread_id = %thread.id, %error, "failed to fetch thread history");
                self.deps
                    .threads
                    .deliver(thread, "Error: failed to fetch thread history.")
                    .await?;
                return Ok(());
            }
        };

        // The triggering message is re-added by the assembler as the newest turn.
        let history: Vec<RawMessage> = history
            .into_iter()
            .filter(|message| message.id != command.source.id)
            .collect();

        let turns = self
            .assembler
            .assemble(&history, &command.content, self.deps.max_history);
        if turns.is_empty() {
            tracing::info!(thread_id = %thread.id, "nothing to respond to");
            self.deps
                .threads
                .deliver(thread, "Nothing to respond to.")
                .await?;
            return Ok(());
        }

        tracing::info!(
            thread_id = %thread.id,
            turns = turns.len(),
            history = history.len(),
            "requesting completion"
        );

        let reply = match self.deps.completion.send(&turns).await {
            Ok(response) => response.content,
            Err(error) => {
                tracing::error!(thread_id = %thread.id, kind = %error.kind, %error, "completion failed");
                completion_error_message(&error)
            }
        };

        self.deps.threads.deliver(thread, &reply).await?;
        Ok(())
    }

    /// Pull upstream changes if any. Never fails the command.
    async fn sync_repository(&self, thread: &ThreadHandle) {
        let info = match self.deps.repo.check_for_updates().await {
            Ok(info) => info,
            Err(error) => {
                tracing::warn!(%error, "git update check failed");
                return;
            }
        };

        if !info.has_updates {
            tracing::debug!("repository is up to date");
            return;
        }

        tracing::info!(behind = info.behind, ahead = info.ahead, "pulling repository changes");

        let notice = match self.deps.repo.pull_changes().await {
            Ok(pulled) if pulled.updated => {
                format!("📥 **Repository updated**\n{}", pulled.summary)
            }
            Ok(_) => return,
            Err(error) => {
                tracing::error!(%error, "git pull failed");
                format!("Git update error: {}\n\nContinuing anyway.", error.message)
            }
        };

        if let Err(error) = self.deps.threads.deliver(thread, &notice).await {
            tracing::warn!(thread_id = %thread.id, %error, "failed to post repository notice");
        }
    }
}

/// User-facing text for a completion failure.
fn completion_error_message(error: &CompletionError) -> String {
    match error.kind {
        CompletionErrorKind::Auth => format!(
            "Authentication error: {}\n\nCheck ANTHROPIC_API_KEY or CLAUDE_CODE_OAUTH_TOKEN.",
            error.message
        ),
        CompletionErrorKind::Timeout => {
            format!("Timed out: {}\n\nPlease try again.", error.message)
        }
        _ => format!("Completion error: {}", error.message),
    }
}
