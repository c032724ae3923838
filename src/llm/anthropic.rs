//! Anthropic messages API transport.

use crate::conversation::ConversationTurn;
use crate::error::{CompletionError, CompletionErrorKind};
use crate::llm::retry::{classify_message, classify_status};
use crate::llm::{CompletionResponse, CompletionTransport, TokenUsage};
use crate::redact::{redact, truncate_chars};

use anyhow::Context as _;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Calls `POST {base_url}/v1/messages` once per attempt.
#[derive(Debug, Clone)]
pub struct AnthropicTransport {
    http: reqwest::Client,
    messages_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicTransport {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("threadrelay/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            messages_url: format!("{}/v1/messages", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
        })
    }
}

#[async_trait::async_trait]
impl CompletionTransport for AnthropicTransport {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(
        &self,
        turns: &[ConversationTurn],
    ) -> Result<CompletionResponse, CompletionError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": turns,
        });

        let response = self
            .http
            .post(&self.messages_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|error| classify_send_error(&error))?;

        let status = response.status();
        let response_text = response.text().await.map_err(|error| {
            CompletionError::new(
                CompletionErrorKind::TransportError,
                format!("failed to read response body: {error}"),
            )
        })?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &response_text));
        }

        let response_body: serde_json::Value =
            serde_json::from_str(&response_text).map_err(|error| {
                CompletionError::new(
                    CompletionErrorKind::Unknown,
                    format!(
                        "response ({status}) is not valid JSON: {error}; body: {}",
                        truncate_chars(&response_text, MAX_ERROR_BODY_CHARS)
                    ),
                )
            })?;

        parse_messages_response(&response_body)
    }
}

fn classify_send_error(error: &reqwest::Error) -> CompletionError {
    let message = redact(&error.to_string());
    let kind = if error.is_timeout() || classify_message(&message) == CompletionErrorKind::Timeout
    {
        CompletionErrorKind::Timeout
    } else {
        CompletionErrorKind::TransportError
    };
    CompletionError::new(kind, message)
}

/// Build a classified error from a non-2xx response.
fn api_error(status: u16, body: &str) -> CompletionError {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| truncate_chars(body, MAX_ERROR_BODY_CHARS).to_string());

    CompletionError::new(
        classify_status(status),
        format!("API error ({status}): {detail}"),
    )
    .with_status(status)
}

/// Join every text block and read token usage.
fn parse_messages_response(
    body: &serde_json::Value,
) -> Result<CompletionResponse, CompletionError> {
    let blocks = body["content"].as_array().ok_or_else(|| {
        CompletionError::new(
            CompletionErrorKind::Unknown,
            "response has no content array",
        )
    })?;

    let text = blocks
        .iter()
        .filter(|block| block["type"].as_str() == Some("text"))
        .filter_map(|block| block["text"].as_str())
        .collect::<Vec<_>>()
        .join("\n");

    if text.trim().is_empty() {
        return Err(CompletionError::new(
            CompletionErrorKind::Unknown,
            "empty response from completion service",
        ));
    }

    let usage = body.get("usage").map(|usage| TokenUsage {
        input_tokens: usage["input_tokens"].as_u64().unwrap_or(0),
        output_tokens: usage["output_tokens"].as_u64().unwrap_or(0),
    });

    Ok(CompletionResponse {
        content: text,
        usage,
    })
}
