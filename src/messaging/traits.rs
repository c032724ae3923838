//! Chat platform trait and dynamic dispatch companion.

use crate::error::Result;
use crate::{DeliveredMessage, RawMessage, ThreadHandle};

use futures::future::BoxFuture;

/// Static trait for chat platform adapters.
/// Use this for type-safe implementations.
pub trait ChatPlatform: Send + Sync + 'static {
    /// Unique name for this adapter.
    fn name(&self) -> &str;

    /// Start a thread anchored to `message`.
    fn create_thread(
        &self,
        message: &RawMessage,
        name: &str,
        auto_archive_minutes: u16,
    ) -> impl std::future::Future<Output = Result<ThreadHandle>> + Send;

    /// Fetch up to `limit` recent messages from a thread, in any order.
    fn fetch_messages(
        &self,
        thread: &ThreadHandle,
        limit: u8,
    ) -> impl std::future::Future<Output = Result<Vec<RawMessage>>> + Send;

    /// Post one message. `content` must already fit the platform limit.
    fn send_message(
        &self,
        thread: &ThreadHandle,
        content: &str,
    ) -> impl std::future::Future<Output = Result<DeliveredMessage>> + Send;

    /// Show a typing indicator.
    fn send_typing(
        &self,
        thread: &ThreadHandle,
    ) -> impl std::future::Future<Output = Result<()>> + Send {
        let _ = thread;
        async { Ok(()) }
    }
}

/// Dynamic trait for runtime polymorphism.
/// Use this when you need `Arc<dyn ChatPlatformDyn>`.
pub trait ChatPlatformDyn: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn create_thread<'a>(
        &'a self,
        message: &'a RawMessage,
        name: &'a str,
        auto_archive_minutes: u16,
    ) -> BoxFuture<'a, Result<ThreadHandle>>;

    fn fetch_messages<'a>(
        &'a self,
        thread: &'a ThreadHandle,
        limit: u8,
    ) -> BoxFuture<'a, Result<Vec<RawMessage>>>;

    fn send_message<'a>(
        &'a self,
        thread: &'a ThreadHandle,
        content: &'a str,
    ) -> BoxFuture<'a, Result<DeliveredMessage>>;

    fn send_typing<'a>(&'a self, thread: &'a ThreadHandle) -> BoxFuture<'a, Result<()>>;
}

/// Blanket implementation: any type implementing ChatPlatform automatically implements ChatPlatformDyn.
impl<T: ChatPlatform> ChatPlatformDyn for T {
    fn name(&self) -> &str {
        ChatPlatform::name(self)
    }

    fn create_thread<'a>(
        &'a self,
        message: &'a RawMessage,
        name: &'a str,
        auto_archive_minutes: u16,
    ) -> BoxFuture<'a, Result<ThreadHandle>> {
        Box::pin(ChatPlatform::create_thread(
            self,
            message,
            name,
            auto_archive_minutes,
        ))
    }

    fn fetch_messages<'a>(
        &'a self,
        thread: &'a ThreadHandle,
        limit: u8,
    ) -> BoxFuture<'a, Result<Vec<RawMessage>>> {
        Box::pin(ChatPlatform::fetch_messages(self, thread, limit))
    }

    fn send_message<'a>(
        &'a self,
        thread: &'a ThreadHandle,
        content: &'a str,
    ) -> BoxFuture<'a, Result<DeliveredMessage>> {
        Box::pin(ChatPlatform::send_message(self, thread, content))
    }

    fn send_typing<'a>(&'a self, thread: &'a ThreadHandle) -> BoxFuture<'a, Result<()>> {
        Box::pin(ChatPlatform::send_typing(self, thread))
    }
}
