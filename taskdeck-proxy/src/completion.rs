//! Upstream text completion.
//!
//! [`Completer`] is the seam between the HTTP handler and the model
//! provider. [`GroqCompleter`] talks to an OpenAI-compatible
//! `/chat/completions` endpoint.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::config::UpstreamConfig;

/// Errors from the upstream completion call.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// The request could not be sent or the body could not be read.
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("completion API returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The provider answered without any message content.
    #[error("completion API returned no content")]
    EmptyContent,
}

/// Produces a completion for a prompt.
pub trait Completer: Send + Sync + 'static {
    /// Returns the model's text for `prompt`.
    fn complete(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<String, CompletionError>> + Send;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Chat-completions client for Groq (or any OpenAI-compatible API).
#[derive(Debug, Clone)]
pub struct GroqCompleter {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GroqCompleter {
    /// Builds a completer from upstream settings and the API key.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::Http`] if the HTTP client cannot be built.
    pub fn new(
        config: &UpstreamConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("taskdeck-proxy/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Builds a completer if `config` carries an API key.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &UpstreamConfig) -> Result<Option<Self>, CompletionError> {
        config
            .api_key
            .as_deref()
            .map(|key| Self::new(config, key))
            .transpose()
    }
}

impl Completer for GroqCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: 1.0,
            stream: false,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(CompletionError::EmptyContent)?;
        tracing::debug!(model = %self.model, len = content.len(), "completion received");
        Ok(content)
    }
}
