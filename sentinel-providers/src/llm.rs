// sentinel-providers/src/llm.rs
// ============================================================================
// Module: LLM Transport
// Description: OpenAI-compatible chat-completions client with cancellation.
// Purpose: One HTTP call site for trace classification and output fact-checking.
// Dependencies: reqwest, serde_json, tokio::time
// ============================================================================

//! ## Overview
//! `spec.md` §6: `POST {endpoint}/chat/completions` with
//! `{model, messages, temperature, max_tokens, response_format:{type:"json_object"}}`
//! and an optional bearer token; only `choices[0].message.content` is read.
//! Every call is wrapped in [`tokio::time::timeout`] so a hung transport
//! cannot block the caller past the configured budget (`spec.md` §5
//! "Cancellation").

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Default sampling temperature used by trace classification (`spec.md` §4.6).
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
/// Default response token budget.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
/// Default per-call timeout, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// A single chat message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// `system`, `user`, or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Builds a `system` message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    /// Builds a `user` message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// A chat-completion request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Base endpoint; the client posts to `{endpoint}/chat/completions`.
    pub endpoint: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Model name.
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Response token budget.
    pub max_tokens: u32,
    /// Cancellation budget for the whole call.
    pub timeout: Duration,
}

impl LlmRequest {
    /// Builds a request using the spec defaults for temperature, max tokens,
    /// and timeout, leaving only endpoint/model/messages/key to fill in.
    #[must_use]
    pub fn with_defaults(endpoint: impl Into<String>, model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            model: model.into(),
            messages,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionReply {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: String,
}

/// Failure modes for [`LlmClient::complete`].
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The call did not finish within the request's timeout.
    #[error("llm call timed out")]
    Timeout,
    /// The HTTP transport itself failed.
    #[error("llm transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The reply did not follow the OpenAI chat-completion shape.
    #[error("llm reply did not contain choices[0].message.content")]
    UnexpectedShape,
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone, Default)]
pub struct LlmClient {
    http: reqwest::Client,
}

impl LlmClient {
    /// Builds a client over a fresh `reqwest::Client`.
    #[must_use]
    pub fn new() -> Self {
        Self { http: reqwest::Client::new() }
    }

    /// Sends a chat-completion request, returning the reply's
    /// `choices[0].message.content`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Timeout`] if `request.timeout` elapses,
    /// [`LlmError::Transport`] on an HTTP-level failure, or
    /// [`LlmError::UnexpectedShape`] if the reply doesn't parse.
    pub async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        tokio::time::timeout(request.timeout, self.send(request)).await.map_err(|_elapsed| LlmError::Timeout)?
    }

    async fn send(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", request.endpoint.trim_end_matches('/'));
        let body = ChatCompletionBody {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: ResponseFormat { kind: "json_object" },
        };
        let mut builder = self.http.post(url).json(&body);
        if let Some(key) = &request.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?.error_for_status()?;
        let reply: ChatCompletionReply = response.json().await?;
        reply.choices.into_iter().next().map(|c| c.message.content).ok_or(LlmError::UnexpectedShape)
    }
}
