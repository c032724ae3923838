//! Retrying completion client.

use crate::conversation::ConversationTurn;
use crate::error::{CompletionError, CompletionErrorKind};
use crate::llm::retry::{self, ATTEMPT_TIMEOUT, MAX_ATTEMPTS};
use crate::llm::{CompletionResponse, CompletionTransport, UsageAccumulator};

use std::sync::Arc;
use std::time::Duration;

/// Sends conversations through a transport with bounded retries and a
/// per-attempt timeout, recording usage for every successful response.
#[derive(Clone)]
pub struct CompletionClient {
    transport: Arc<dyn CompletionTransport>,
    usage: Arc<UsageAccumulator>,
    attempt_timeout: Duration,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("transport", &self.transport.name())
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

impl CompletionClient {
    pub fn new(transport: Arc<dyn CompletionTransport>, usage: Arc<UsageAccumulator>) -> Self {
        Self {
            transport,
            usage,
            attempt_timeout: ATTEMPT_TIMEOUT,
        }
    }

    pub fn usage(&self) -> &Arc<UsageAccumulator> {
        &self.usage
    }

    /// Send `turns` and return the generated text.
    ///
    /// Makes at most [`MAX_ATTEMPTS`] attempts, sleeping `2^attempt` seconds
    /// before each retry of a retryable failure. Non-retryable failures return
    /// immediately. After the last attempt the final classified error is
    /// returned.
    pub async fn send(
        &self,
        turns: &[ConversationTurn],
    ) -> Result<CompletionResponse, CompletionError> {
        let is_process = self.transport.is_process();
        let mut last_error = None;

        for attempt in 0..MAX_ATTEMPTS {
            match self.attempt(turns).await {
                Ok(response) => {
                    if let Some(usage) = response.usage {
                        self.usage.record(usage);
                    }
                    tracing::debug!(
                        transport = self.transport.name(),
                        attempt = attempt + 1,
                        chars = response.content.chars().count(),
                        "completion succeeded"
                    );
                    return Ok(response);
                }
                Err(error) => {
                    if !retry::is_retryable(&error, is_process) {
                        tracing::warn!(
                            transport = self.transport.name(),
                            attempt = attempt + 1,
                            kind = %error.kind,
                            %error,
                            "non-retryable completion error"
                        );
                        return Err(error);
                    }

                    tracing::warn!(
                        transport = self.transport.name(),
                        attempt = attempt + 1,
                        kind = %error.kind,
                        %error,
                        "retryable completion error"
                    );

                    if attempt + 1 < MAX_ATTEMPTS {
                        let delay = retry::backoff_delay(attempt);
                        tracing::debug!(delay_ms = delay.as_millis() as u64, "retrying after backoff");
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            CompletionError::new(CompletionErrorKind::Unknown, "no completion attempts were made")
        }))
    }

    async fn attempt(
        &self,
        turns: &[ConversationTurn],
    ) -> Result<CompletionResponse, CompletionError> {
        match tokio::time::timeout(self.attempt_timeout, self.transport.complete(turns)).await {
            Ok(result) => result,
            Err(_) => Err(CompletionError::new(
                CompletionErrorKind::Timeout,
                format!(
                    "request timed out after {}s",
                    self.attempt_timeout.as_secs()
                ),
            )),
        }
    }
}
