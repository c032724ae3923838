//! Thread resolution, history retrieval, and ordered delivery.

use crate::error::ThreadError;
use crate::messaging::ChatPlatformDyn;
use crate::messaging::chunk::{self, DISCORD_MESSAGE_LIMIT};
use crate::{DeliveredMessage, RawMessage, ThreadHandle};

use chrono::Utc;
use std::sync::Arc;

/// Messages requested per history fetch.
pub const HISTORY_FETCH_LIMIT: u8 = 100;

/// Inactivity period after which new threads archive themselves.
pub const AUTO_ARCHIVE_MINUTES: u16 = 60;

/// The thread a command is answered in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedThread {
    pub handle: ThreadHandle,
    /// True when the thread was started for this command.
    pub created: bool,
}

/// Thread operations on top of a chat platform.
#[derive(Clone)]
pub struct ThreadLifecycle {
    platform: Arc<dyn ChatPlatformDyn>,
    message_limit: usize,
}

impl ThreadLifecycle {
    pub fn new(platform: Arc<dyn ChatPlatformDyn>) -> Self {
        Self {
            platform,
            message_limit: DISCORD_MESSAGE_LIMIT,
        }
    }

    /// Return the thread `message` was posted in, or start a new one
    /// anchored to it.
    pub async fn resolve_thread(&self, message: &RawMessage) -> Result<ResolvedThread, ThreadError> {
        if message.is_thread {
            return Ok(ResolvedThread {
                handle: ThreadHandle {
                    id: message.channel_id.clone(),
                    name: String::new(),
                },
                created: false,
            });
        }

        let name = format!("Conversation - {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
        let handle = self
            .platform
            .create_thread(message, &name, AUTO_ARCHIVE_MINUTES)
            .await
            .map_err(|error| ThreadError::CreationFailed(error.to_string()))?;

        tracing::info!(
            thread_id = %handle.id,
            message_id = %message.id,
            thread_name = %handle.name,
            "created conversation thread"
        );

        Ok(ResolvedThread {
            handle,
            created: true,
        })
    }

    pub async fn fetch_history(
        &self,
        thread: &ThreadHandle,
        limit: u8,
    ) -> Result<Vec<RawMessage>, ThreadError> {
        self.platform
            .fetch_messages(thread, limit)
            .await
            .map_err(|error| ThreadError::FetchFailed(error.to_string()))
    }

    /// Chunk `text` and send the pieces one at a time, in order.
    ///
    /// Returns the last delivered message. A failed send stops delivery;
    /// chunks already sent stay in the thread.
    pub async fn deliver(
        &self,
        thread: &ThreadHandle,
        text: &str,
    ) -> Result<DeliveredMessage, ThreadError> {
        let chunks = chunk::split(text, self.message_limit);
        let total = chunks.len();
        let mut last = None;

        for (index, chunk) in chunks.iter().enumerate() {
            let delivered = self
                .platform
                .send_message(thread, chunk)
                .await
                .map_err(|error| {
                    tracing::warn!(
                        thread_id = %thread.id,
                        chunk = index + 1,
                        total,
                        %error,
                        "delivery failed"
                    );
                    ThreadError::SendFailed(error.to_string())
                })?;
            last = Some(delivered);
        }

        tracing::debug!(thread_id = %thread.id, chunks = total, "delivered response");
        last.ok_or_else(|| ThreadError::SendFailed("nothing to send".into()))
    }

    /// Best-effort typing indicator.
    pub async fn send_typing(&self, thread: &ThreadHandle) {
        if let Err(error) = self.platform.send_typing(thread).await {
            tracing::debug!(thread_id = %thread.id, %error, "typing indicator failed");
        }
    }
}
