//! Proxy server core: shared state, the generate-tasks handler, and the
//! error-to-response mapping.
//!
//! Requests are checked in a fixed order: method (by routing), credential,
//! prompt presence, prompt length. Only then is the upstream model called.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use taskdeck_proto::suggest::{
    self, ErrorBody, GENERATE_TASKS_PATH, GenerateTasksRequest, GenerateTasksResponse,
};

use crate::completion::{Completer, CompletionError};

/// Default maximum prompt length in characters.
const DEFAULT_MAX_PROMPT_LEN: usize = 2000;

/// Errors returned by the generate-tasks endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// No API credential is configured.
    #[error("API key is not configured.")]
    MissingApiKey,

    /// The body was not a request with a non-blank prompt.
    #[error("Prompt is required")]
    MissingPrompt {
        /// Body parse failure, if that was the cause.
        details: Option<String>,
    },

    /// The prompt is longer than the configured limit.
    #[error("Prompt is too long")]
    PromptTooLong {
        /// Prompt length in characters.
        len: usize,
        /// Configured limit.
        max: usize,
    },

    /// The upstream call failed or produced nothing.
    #[error("Failed to generate tasks from AI.")]
    Completion(#[from] CompletionError),

    /// The endpoint was called with a method other than POST.
    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl ProxyError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingApiKey | Self::Completion(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingPrompt { .. } | Self::PromptTooLong { .. } => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// JSON body for this error.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        let body = ErrorBody::new(self.to_string());
        match self {
            Self::MissingPrompt {
                details: Some(details),
            } => body.with_details(details.clone()),
            Self::PromptTooLong { len, max } => {
                body.with_details(format!("{len} characters, limit is {max}"))
            }
            Self::Completion(e) => body.with_details(e.to_string()),
            _ => body,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(self.body());
        if matches!(self, Self::MethodNotAllowed) {
            (status, [(header::ALLOW, "POST")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

/// Shared proxy state.
pub struct ProxyState<C: Completer> {
    /// Upstream completer; `None` when no credential is configured.
    completer: Option<C>,
    /// Longest accepted prompt, in characters.
    max_prompt_len: usize,
}

impl<C: Completer> ProxyState<C> {
    /// Creates state with the default prompt limit.
    #[must_use]
    pub const fn new(completer: Option<C>) -> Self {
        Self::with_config(completer, DEFAULT_MAX_PROMPT_LEN)
    }

    /// Creates state with a custom prompt limit.
    #[must_use]
    pub const fn with_config(completer: Option<C>, max_prompt_len: usize) -> Self {
        Self {
            completer,
            max_prompt_len,
        }
    }

    /// Validates a raw request body and returns suggested task titles.
    ///
    /// # Errors
    ///
    /// Returns a [`ProxyError`] for the first check that fails.
    pub async fn generate(&self, body: &[u8]) -> Result<Vec<String>, ProxyError> {
        let Some(completer) = &self.completer else {
            tracing::error!("generate-tasks called without an API key configured");
            return Err(ProxyError::MissingApiKey);
        };

        let request: GenerateTasksRequest =
            serde_json::from_slice(body).map_err(|e| ProxyError::MissingPrompt {
                details: Some(e.to_string()),
            })?;
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(ProxyError::MissingPrompt { details: None });
        }

        let len = prompt.chars().count();
        if len > self.max_prompt_len {
            return Err(ProxyError::PromptTooLong {
                len,
                max: self.max_prompt_len,
            });
        }

        let text = completer
            .complete(&suggest::build_prompt(prompt))
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "upstream completion failed"))?;
        let tasks = suggest::parse_task_list(&text);
        tracing::info!(count = tasks.len(), "generated task suggestions");
        Ok(tasks)
    }
}

/// Builds the proxy router.
#[must_use]
pub fn router<C: Completer>(state: Arc<ProxyState<C>>) -> axum::Router {
    axum::Router::new()
        .route(
            GENERATE_TASKS_PATH,
            post(generate_tasks::<C>).fallback(method_not_allowed),
        )
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Starts the proxy server with a pre-configured [`ProxyState`].
///
/// Returns the bound address (useful with port `0`) and the server task.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state<C: Completer>(
    addr: &str,
    state: Arc<ProxyState<C>>,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), Box<dyn std::error::Error + Send + Sync>>
{
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "proxy server error");
        }
    });

    Ok((bound_addr, handle))
}

async fn generate_tasks<C: Completer>(
    State(state): State<Arc<ProxyState<C>>>,
    body: Bytes,
) -> Result<Json<GenerateTasksResponse>, ProxyError> {
    let tasks = state.generate(&body).await?;
    Ok(Json(GenerateTasksResponse { tasks }))
}

async fn method_not_allowed() -> ProxyError {
    ProxyError::MethodNotAllowed
}

async fn healthz() -> &'static str {
    "ok"
}
