//! HTTP client for the task-suggestion proxy.

use std::time::Duration;

use taskdeck_proto::suggest::{
    ErrorBody, GENERATE_TASKS_PATH, GenerateTasksRequest, GenerateTasksResponse,
};
use url::Url;

/// Errors returned by [`SuggestClient`].
#[derive(Debug, thiserror::Error)]
pub enum SuggestError {
    /// The prompt was empty after trimming; nothing was sent.
    #[error("prompt is empty")]
    EmptyPrompt,

    /// The proxy base URL could not be used.
    #[error("invalid proxy url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request could not be sent or the response could not be read.
    #[error("request to suggestion proxy failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The proxy answered with an error status.
    #[error("suggestion proxy returned {status}: {error}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// The proxy's error message.
        error: String,
        /// Underlying cause reported by the proxy, if any.
        details: Option<String>,
    },
}

/// Client for `POST /api/generate-tasks`.
#[derive(Debug, Clone)]
pub struct SuggestClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl SuggestClient {
    /// Creates a client for the proxy at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestError::InvalidUrl`] if `base_url` does not parse,
    /// or [`SuggestError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SuggestError> {
        let endpoint = Url::parse(base_url)?.join(GENERATE_TASKS_PATH)?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("taskdeck/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { http, endpoint })
    }

    /// Full URL requests are posted to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Asks the proxy for task suggestions.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestError::EmptyPrompt`] without contacting the proxy
    /// for a blank prompt, [`SuggestError::Rejected`] when the proxy
    /// answers with an error status, and [`SuggestError::Http`] for
    /// transport or decoding failures.
    pub async fn generate(&self, prompt: &str) -> Result<Vec<String>, SuggestError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SuggestError::EmptyPrompt);
        }

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&GenerateTasksRequest::new(prompt))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: GenerateTasksResponse = response.json().await?;
            tracing::debug!(count = body.tasks.len(), "received task suggestions");
            return Ok(body.tasks);
        }

        // Non-JSON error bodies still produce a usable message.
        let text = response.text().await?;
        let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_else(|_| {
            ErrorBody::new(
                status
                    .canonical_reason()
                    .unwrap_or("unexpected response")
                    .to_string(),
            )
        });
        tracing::warn!(status = status.as_u16(), error = %body.error, "suggestion request rejected");
        Err(SuggestError::Rejected {
            status: status.as_u16(),
            error: body.error,
            details: body.details,
        })
    }
}
