//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use std::path::PathBuf;

const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_MAX_TOKENS: u32 = 8192;
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_HISTORY: usize = 50;

/// threadrelay configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token.
    pub discord_token: String,

    /// Completion service settings.
    pub llm: LlmConfig,

    /// Managed repository settings.
    pub repo: RepoConfig,

    /// Extra name the bot is addressed by, stripped from message text.
    pub bot_name: Option<String>,

    /// Maximum source messages considered per conversation.
    pub max_thread_history: usize,

    /// Logging settings.
    pub log: LogConfig,
}

/// Which transport reaches the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionBackend {
    /// HTTP messages API.
    Api,
    /// Local `claude` CLI process.
    Cli,
}

/// Completion service configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: CompletionBackend,

    /// Anthropic API key (API backend).
    pub anthropic_key: Option<String>,

    /// OAuth token forwarded to the CLI backend.
    pub oauth_token: Option<String>,

    pub model: String,
    pub max_tokens: u32,
    pub base_url: String,

    /// Path or name of the CLI executable.
    pub cli_path: String,
}

/// Managed repository configuration.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    pub url: String,
    pub github_token: Option<String>,
    pub path: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub to_file: bool,
    pub dir: PathBuf,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Blank values count as unset. Every missing required key is reported
    /// in a single error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut missing = Vec::new();
        let discord_token = get("DISCORD_BOT_TOKEN");
        if discord_token.is_none() {
            missing.push("DISCORD_BOT_TOKEN".to_string());
        }
        let repo_url = get("GIT_REPOSITORY_URL");
        if repo_url.is_none() {
            missing.push("GIT_REPOSITORY_URL".to_string());
        }

        let anthropic_key = get("ANTHROPIC_API_KEY");
        let oauth_token = get("CLAUDE_CODE_OAUTH_TOKEN").or_else(|| get("ANTHROPIC_AUTH_TOKEN"));
        if anthropic_key.is_none() && oauth_token.is_none() {
            missing.push("ANTHROPIC_API_KEY or CLAUDE_CODE_OAUTH_TOKEN".to_string());
        }

        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing).into());
        }

        let backend = match get("COMPLETION_BACKEND").as_deref().map(str::to_lowercase) {
            None if anthropic_key.is_some() => CompletionBackend::Api,
            None => CompletionBackend::Cli,
            Some(value) if value == "api" => CompletionBackend::Api,
            Some(value) if value == "cli" => CompletionBackend::Cli,
            Some(other) => {
                return Err(ConfigError::Invalid(format!(
                    "COMPLETION_BACKEND must be `api` or `cli`, got `{other}`"
                ))
                .into());
            }
        };

        if backend == CompletionBackend::Api && anthropic_key.is_none() {
            return Err(ConfigError::MissingKeys(vec!["ANTHROPIC_API_KEY".into()]).into());
        }

        let max_tokens = parse_number(&get, "CLAUDE_MAX_TOKENS", DEFAULT_MAX_TOKENS)?;
        let max_thread_history = parse_number(&get, "MAX_THREAD_HISTORY", DEFAULT_MAX_HISTORY)?;
        if max_thread_history == 0 {
            return Err(ConfigError::Invalid("MAX_THREAD_HISTORY must be positive".into()).into());
        }

        let llm = LlmConfig {
            backend,
            anthropic_key,
            oauth_token,
            model: get("CLAUDE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            max_tokens,
            base_url: get("ANTHROPIC_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            cli_path: get("CLAUDE_CLI_PATH").unwrap_or_else(|| "claude".into()),
        };

        let repo = RepoConfig {
            url: repo_url.unwrap_or_default(),
            github_token: get("GITHUB_TOKEN"),
            path: get("REPO_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("repo")),
        };

        let log = LogConfig {
            level: get("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            to_file: parse_bool(&get, "LOG_TO_FILE")?,
            dir: get("LOG_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_log_dir),
        };

        Ok(Self {
            discord_token: discord_token.unwrap_or_default(),
            llm,
            repo,
            bot_name: get("BOT_NAME"),
            max_thread_history,
            log,
        })
    }
}

fn default_log_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("threadrelay").join("logs"))
        .unwrap_or_else(|| PathBuf::from("./logs"))
}

fn parse_number<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match get(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{key} must be a number, got `{value}`")).into()),
    }
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<bool> {
    match get(key).as_deref().map(str::trim) {
        None => Ok(false),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => {
            Err(ConfigError::Invalid(format!("{key} must be true or false, got `{other}`")).into())
        }
    }
}
