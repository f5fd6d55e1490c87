//! Configuration system for the `Taskdeck` suggestion proxy.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskdeck-proxy/config.toml`)
//! 4. Compiled defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

/// Errors that can occur when loading proxy configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The upstream base URL is not an absolute http(s) URL.
    #[error("invalid upstream url {url:?}: {reason}")]
    InvalidUrl {
        /// The rejected value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure for the proxy.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ProxyConfigFile {
    server: ServerFileConfig,
    upstream: UpstreamFileConfig,
}

/// `[server]` section of the proxy config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    max_prompt_len: Option<usize>,
}

/// `[upstream]` section of the proxy config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UpstreamFileConfig {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the proxy server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Taskdeck task-suggestion proxy")]
pub struct ProxyCliArgs {
    /// Address to bind the proxy server to.
    #[arg(short, long, env = "PROXY_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/taskdeck-proxy/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Credential for the completion API.
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible completion API.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Completion model name.
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum prompt length in characters.
    #[arg(long)]
    pub max_prompt_len: Option<usize>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "PROXY_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Settings for the upstream completion API.
#[derive(Clone, PartialEq)]
pub struct UpstreamConfig {
    /// API credential. `None` makes every generate request fail with 500.
    pub api_key: Option<String>,
    /// Base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion length limit.
    pub max_tokens: u32,
    /// Timeout for one upstream request.
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.5,
            max_tokens: 1024,
            timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Fully resolved proxy server configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address to bind the server to (e.g., `127.0.0.1:3001`).
    pub bind_addr: String,
    /// Longest accepted prompt, in characters.
    pub max_prompt_len: usize,
    /// Completion API settings.
    pub upstream: UpstreamConfig,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            max_prompt_len: 2000,
            upstream: UpstreamConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and missing file
    /// is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed, or if the upstream base URL is invalid.
    pub fn load(cli: &ProxyCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ProxyConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &ProxyCliArgs, file: &ProxyConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let up = &file.upstream;

        let base_url = cli
            .base_url
            .clone()
            .or_else(|| up.base_url.clone())
            .unwrap_or(defaults.upstream.base_url);
        validate_base_url(&base_url)?;

        Ok(Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            max_prompt_len: cli
                .max_prompt_len
                .or(file.server.max_prompt_len)
                .unwrap_or(defaults.max_prompt_len),
            upstream: UpstreamConfig {
                // A blank key counts as unset.
                api_key: cli
                    .api_key
                    .clone()
                    .or_else(|| up.api_key.clone())
                    .filter(|k| !k.trim().is_empty()),
                base_url: base_url.trim_end_matches('/').to_string(),
                model: cli
                    .model
                    .clone()
                    .or_else(|| up.model.clone())
                    .unwrap_or(defaults.upstream.model),
                temperature: up.temperature.unwrap_or(defaults.upstream.temperature),
                max_tokens: up.max_tokens.unwrap_or(defaults.upstream.max_tokens),
                timeout: up
                    .timeout_secs
                    .map_or(defaults.upstream.timeout, Duration::from_secs),
            },
            log_level: cli.log_level.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_base_url(raw: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme {other}"))),
    }
}

/// Load and parse a TOML config file for the proxy.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ProxyConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ProxyConfigFile::default());
    };
    let path = config_dir.join("taskdeck-proxy").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProxyConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
