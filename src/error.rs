//! Top-level error types for threadrelay.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Thread(#[from] ThreadError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("platform request failed: {0}")]
    Platform(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required config keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure classes reported by the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionErrorKind {
    RateLimit,
    Auth,
    Server,
    Timeout,
    TransportError,
    CliError,
    Unknown,
}

impl std::fmt::Display for CompletionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CompletionErrorKind::RateLimit => "rate_limit",
            CompletionErrorKind::Auth => "auth",
            CompletionErrorKind::Server => "server",
            CompletionErrorKind::Timeout => "timeout",
            CompletionErrorKind::TransportError => "transport_error",
            CompletionErrorKind::CliError => "cli_error",
            CompletionErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A classified completion failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CompletionError {
    pub kind: CompletionErrorKind,
    pub message: String,
    pub status_code: Option<u16>,
}

impl CompletionError {
    pub fn new(kind: CompletionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }
}

/// Structural failures while working with a platform thread.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThreadError {
    #[error("thread creation failed: {0}")]
    CreationFailed(String),

    #[error("failed to fetch thread history: {0}")]
    FetchFailed(String),

    #[error("failed to send message: {0}")]
    SendFailed(String),
}

/// Which repository operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoOperation {
    Init,
    Status,
    Check,
    Pull,
}

impl std::fmt::Display for RepoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RepoOperation::Init => "init",
            RepoOperation::Status => "status",
            RepoOperation::Check => "check",
            RepoOperation::Pull => "pull",
        };
        f.write_str(name)
    }
}

/// Version-control errors. Messages are redacted before construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("git {operation} failed: {message}")]
pub struct RepoError {
    pub operation: RepoOperation,
    pub message: String,
}
