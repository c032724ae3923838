//! Local `claude` CLI transport.

use crate::conversation::{ConversationTurn, Role};
use crate::error::{CompletionError, CompletionErrorKind};
use crate::llm::{CompletionResponse, CompletionTransport};
use crate::redact::{redact, truncate_chars};

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

const MAX_STDERR_CHARS: usize = 500;

/// Output fragments that mean the CLI is not logged in.
const AUTH_MARKERS: &[&str] = &[
    "not authenticated",
    "login",
    "api key",
    "unauthorized",
    "authentication failed",
];

/// Runs `<cli> --print <prompt>` in the repository checkout.
///
/// The CLI is single-turn, so only the last user turn is sent.
#[derive(Debug, Clone)]
pub struct CliTransport {
    program: String,
    working_dir: PathBuf,
    oauth_token: Option<String>,
}

impl CliTransport {
    pub fn new(
        program: impl Into<String>,
        working_dir: impl AsRef<Path>,
        oauth_token: Option<String>,
    ) -> Self {
        Self {
            program: program.into(),
            working_dir: working_dir.as_ref().to_path_buf(),
            oauth_token,
        }
    }
}

#[async_trait::async_trait]
impl CompletionTransport for CliTransport {
    fn name(&self) -> &'static str {
        "cli"
    }

    fn is_process(&self) -> bool {
        true
    }

    async fn complete(
        &self,
        turns: &[ConversationTurn],
    ) -> Result<CompletionResponse, CompletionError> {
        // Retrying cannot produce a prompt, so this is not a process failure.
        let prompt = last_user_prompt(turns).ok_or_else(|| {
            CompletionError::new(CompletionErrorKind::Unknown, "no user message")
        })?;

        let mut command = Command::new(&self.program);
        command
            .arg("--print")
            .arg(prompt)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(token) = &self.oauth_token {
            command.env("CLAUDE_CODE_OAUTH_TOKEN", token);
        }

        let output = command.output().await.map_err(|error| {
            CompletionError::new(
                CompletionErrorKind::TransportError,
                format!("failed to run {}: {error}", self.program),
            )
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(classify_failure(
                output.status.code(),
                &stdout,
                &stderr,
            ));
        }

        let content = stdout.trim();
        if content.is_empty() {
            return Err(CompletionError::new(
                CompletionErrorKind::CliError,
                "CLI produced no output",
            ));
        }

        Ok(CompletionResponse {
            content: content.to_string(),
            usage: None,
        })
    }
}

fn last_user_prompt(turns: &[ConversationTurn]) -> Option<&str> {
    turns
        .iter()
        .rev()
        .find(|turn| turn.role == Role::User)
        .map(|turn| turn.content.as_str())
}

fn classify_failure(exit_code: Option<i32>, stdout: &str, stderr: &str) -> CompletionError {
    let combined = format!("{stdout}\n{stderr}").to_lowercase();
    if AUTH_MARKERS.iter().any(|marker| combined.contains(marker)) {
        return CompletionError::new(
            CompletionErrorKind::Auth,
            "CLI is not authenticated",
        );
    }

    let excerpt = redact(truncate_chars(stderr.trim(), MAX_STDERR_CHARS));
    let code = exit_code.map_or_else(|| "signal".to_string(), |code| code.to_string());
    CompletionError::new(
        CompletionErrorKind::CliError,
        format!("CLI exited with {code}: {excerpt}"),
    )
}
