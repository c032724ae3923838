//! Completion service access: transports, retry policy, and usage totals.

pub mod anthropic;
pub mod cli;
pub mod client;
pub mod retry;
pub mod usage;

pub use anthropic::AnthropicTransport;
pub use cli::CliTransport;
pub use client::CompletionClient;
pub use usage::{TokenUsage, UsageAccumulator, UsageSnapshot};

use crate::config::{CompletionBackend, LlmConfig};
use crate::conversation::ConversationTurn;
use crate::error::CompletionError;

use std::path::Path;
use std::sync::Arc;

/// Generated text plus whatever usage the service reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// One way of reaching the completion service. Each call is one attempt;
/// retries and timeouts belong to [`CompletionClient`].
#[async_trait::async_trait]
pub trait CompletionTransport: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether calls run a local process rather than an HTTP request.
    /// Process failures are treated as transient.
    fn is_process(&self) -> bool {
        false
    }

    async fn complete(
        &self,
        turns: &[ConversationTurn],
    ) -> Result<CompletionResponse, CompletionError>;
}

/// Build the transport selected by `config.backend`.
pub fn build_transport(
    config: &LlmConfig,
    working_dir: &Path,
) -> anyhow::Result<Arc<dyn CompletionTransport>> {
    match config.backend {
        CompletionBackend::Api => {
            let api_key = config.anthropic_key.clone().ok_or_else(|| {
                anyhow::anyhow!("ANTHROPIC_API_KEY is required for the api backend")
            })?;
            let transport = AnthropicTransport::new(
                &config.base_url,
                api_key,
                &config.model,
                config.max_tokens,
            )?;
            Ok(Arc::new(transport))
        }
        CompletionBackend::Cli => Ok(Arc::new(CliTransport::new(
            &config.cli_path,
            working_dir,
            config.oauth_token.clone(),
        ))),
    }
}
