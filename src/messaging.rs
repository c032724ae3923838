//! Chat platform access: routing, threads, chunking, and the Discord adapter.

pub mod chunk;
pub mod discord;
pub mod router;
pub mod threads;
pub mod traits;

pub use discord::{DiscordPlatform, RelayHandler};
pub use threads::ThreadLifecycle;
pub use traits::{ChatPlatform, ChatPlatformDyn};
