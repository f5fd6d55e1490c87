//! Integration tests for the suggestion client against an in-process proxy.
//!
//! Validates:
//! - Suggestions round-trip from client through proxy to completer and back
//! - Proxy rejections surface as `SuggestError::Rejected` with the proxy's message
//! - An unreachable proxy surfaces as a transport error

use std::sync::Arc;
use std::time::Duration;

use taskdeck::suggest::{SuggestClient, SuggestError};
use taskdeck_proxy::completion::{Completer, CompletionError};
use taskdeck_proxy::server::{self, ProxyState};

struct Fixed(&'static str);

impl Completer for Fixed {
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        if self.0.is_empty() {
            Err(CompletionError::EmptyContent)
        } else {
            Ok(self.0.to_string())
        }
    }
}

async fn start_proxy(completer: Option<Fixed>) -> String {
    let state = Arc::new(ProxyState::new(completer));
    let (addr, _handle) = server::start_server_with_state("127.0.0.1:0", state)
        .await
        .expect("failed to start proxy server");
    format!("http://{addr}")
}

fn client(base: &str) -> SuggestClient {
    SuggestClient::new(base, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn suggestions_round_trip() {
    let base = start_proxy(Some(Fixed("Outline chapters, Write chapter one, Edit"))).await;
    let tasks = client(&base).generate("write a book").await.unwrap();
    assert_eq!(tasks, vec!["Outline chapters", "Write chapter one", "Edit"]);
}

#[tokio::test]
async fn missing_credential_is_rejected_with_message() {
    let base = start_proxy(None).await;
    let err = client(&base).generate("write a book").await.unwrap_err();
    match err {
        SuggestError::Rejected {
            status,
            error,
            details,
        } => {
            assert_eq!(status, 500);
            assert_eq!(error, "API key is not configured.");
            assert!(details.is_none());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn upstream_failure_carries_details() {
    let base = start_proxy(Some(Fixed(""))).await;
    let err = client(&base).generate("write a book").await.unwrap_err();
    match err {
        SuggestError::Rejected { error, details, .. } => {
            assert_eq!(error, "Failed to generate tasks from AI.");
            assert_eq!(
                details.as_deref(),
                Some("completion API returned no content")
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreachable_proxy_is_a_transport_error() {
    // Bind and drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}"))
        .generate("anything")
        .await
        .unwrap_err();
    assert!(matches!(err, SuggestError::Http(_)));
}
