//! Failure classification and retry policy for completion calls.

use crate::error::{CompletionError, CompletionErrorKind};

use std::time::Duration;

/// Attempts per `send`, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff before retry `n` (counted from 0) is `RETRY_BASE_DELAY * 2^n`.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for a single attempt.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(180);

/// Classify an HTTP status from the completion service.
pub fn classify_status(status: u16) -> CompletionErrorKind {
    match status {
        429 => CompletionErrorKind::RateLimit,
        401 => CompletionErrorKind::Auth,
        500..=599 => CompletionErrorKind::Server,
        _ => CompletionErrorKind::Unknown,
    }
}

/// Classify a failure that carries only a message.
pub fn classify_message(message: &str) -> CompletionErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        CompletionErrorKind::Timeout
    } else {
        CompletionErrorKind::Unknown
    }
}

/// Whether another attempt may follow `error`.
///
/// Process transports fail transiently (spawn races, CLI restarts), so their
/// process-level and server failures are retried too.
pub fn is_retryable(error: &CompletionError, is_process: bool) -> bool {
    match error.kind {
        CompletionErrorKind::RateLimit | CompletionErrorKind::Timeout => true,
        CompletionErrorKind::TransportError
        | CompletionErrorKind::CliError
        | CompletionErrorKind::Server => is_process,
        CompletionErrorKind::Auth | CompletionErrorKind::Unknown => false,
    }
}

/// Delay before the retry that follows attempt `attempt` (0-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY * 2u32.saturating_pow(attempt)
}
