//! `Taskdeck` suggestion proxy: turns a prompt into suggested task titles.
//!
//! An axum HTTP server that keeps the completion API credential server-side
//! and exposes `POST /api/generate-tasks` to clients.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 127.0.0.1:3001
//! GROQ_API_KEY=gsk_... cargo run --bin taskdeck-proxy
//!
//! # Run on custom address
//! cargo run --bin taskdeck-proxy -- --bind 0.0.0.0:8080
//!
//! # Or via environment variable
//! PROXY_ADDR=0.0.0.0:8080 cargo run --bin taskdeck-proxy
//! ```

use std::sync::Arc;

use clap::Parser;
use taskdeck_proxy::completion::GroqCompleter;
use taskdeck_proxy::config::{ProxyCliArgs, ProxyConfig};
use taskdeck_proxy::server::{self, ProxyState};

#[tokio::main]
async fn main() {
    let cli = ProxyCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match ProxyConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        addr = %config.bind_addr,
        model = %config.upstream.model,
        "starting taskdeck proxy"
    );

    let completer = match GroqCompleter::from_config(&config.upstream) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to build upstream client");
            std::process::exit(1);
        }
    };
    if completer.is_none() {
        tracing::warn!("no API key configured; generate-tasks requests will fail");
    }

    let state = Arc::new(ProxyState::with_config(completer, config.max_prompt_len));

    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "proxy server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "proxy server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start proxy server");
            std::process::exit(1);
        }
    }
}
