//! Configuration management for the relay service.
//!
//! Configuration is read from a JSON file (`config.json` in the working
//! directory by default, overridable via `RELAY_CONFIG`), then overlaid
//! with environment variables. A missing file is not an error: every
//! field has a default, and deployments that configure purely through
//! the environment (e.g. a hosting platform injecting secrets) work
//! without any file at all.
//!
//! # Environment Variable Mapping
//!
//! - `RELAY_BIND_ADDRESS` → server.bind
//! - `PORT` → server.port
//! - `RELAY_LOG_LEVEL` → observability.log_level
//! - `LINE_CHANNEL_SECRET` → line.channel_secret
//! - `LINE_CHANNEL_ACCESS_TOKEN` → line.channel_access_token
//! - `OPENAI_API_KEY` → openai.api_key
//! - `OPENAI_API_BASE` → openai.api_base

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG")
        .map_or_else(|_| PathBuf::from("config.json"), PathBuf::from)
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default: "0.0.0.0" (the webhook must be reachable
    /// from the chat platform).
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    5000
}

// ============================================================================
// LINE Channel Configuration
// ============================================================================

/// LINE Messaging API credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineConfig {
    /// Channel secret, used to verify webhook signatures.
    #[serde(default)]
    pub channel_secret: String,

    /// Channel access token, used to call the Reply API.
    #[serde(default)]
    pub channel_access_token: String,

    /// API base URL. Overridable for tests.
    #[serde(default = "default_line_api_base")]
    pub api_base: String,
}

fn default_line_api_base() -> String {
    "https://api.line.me".into()
}

// ============================================================================
// Completion Provider Configuration
// ============================================================================

/// OpenAI-compatible completion API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key for bearer authentication.
    #[serde(default)]
    pub api_key: String,

    /// API base URL. Overridable for Azure/compatible endpoints or tests.
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,

    /// Model to request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Bounded wait for a single completion call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_openai_api_base(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_openai_api_base() -> String {
    "https://api.openai.com".into()
}

fn default_model() -> String {
    "gpt-4".into()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_timeout_secs() -> u64 {
    30
}

// ============================================================================
// Bot Behavior Configuration
// ============================================================================

/// Dispatcher behavior: persona, fallback text, reply table location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// System persona prepended to every new session.
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Fixed reply substituted when the completion call fails.
    #[serde(default = "default_fallback")]
    pub fallback: String,

    /// Path to the static keyword→reply JSON file.
    #[serde(default = "default_replies_path")]
    pub replies_path: PathBuf,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            persona: default_persona(),
            fallback: default_fallback(),
            replies_path: default_replies_path(),
        }
    }
}

fn default_persona() -> String {
    "你是一個親切、清楚、專業的 AI 助理，會用簡潔清楚的方式回覆使用者問題。".into()
}

fn default_fallback() -> String {
    "抱歉，我現在無法回覆您的訊息，請稍後再試一次。".into()
}

fn default_replies_path() -> PathBuf {
    PathBuf::from("static_replies.json")
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "json" or "pretty".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration for the relay service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// LINE channel credentials
    #[serde(default)]
    pub line: LineConfig,

    /// Completion provider settings
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Dispatcher behavior
    #[serde(default)]
    pub bot: BotConfig,

    /// Logging settings
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path with env overrides applied.
    pub fn load() -> Result<Self> {
        let path = config_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            tracing::info!("Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path (no env overrides).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("RELAY_BIND_ADDRESS") {
            self.server.bind = bind;
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(level) = std::env::var("RELAY_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(secret) = std::env::var("LINE_CHANNEL_SECRET") {
            self.line.channel_secret = secret;
        }
        if let Ok(token) = std::env::var("LINE_CHANNEL_ACCESS_TOKEN") {
            self.line.channel_access_token = token;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.openai.api_key = key;
        }
        if let Ok(base) = std::env::var("OPENAI_API_BASE") {
            self.openai.api_base = base;
        }
    }

    /// Check that required credentials are present.
    ///
    /// Called at startup so a misconfigured deployment fails loudly
    /// instead of rejecting every webhook at runtime.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.line.channel_secret.is_empty() {
            return Err(crate::error::Error::Config(
                "line.channel_secret (LINE_CHANNEL_SECRET) is not set".into(),
            ));
        }
        if self.line.channel_access_token.is_empty() {
            return Err(crate::error::Error::Config(
                "line.channel_access_token (LINE_CHANNEL_ACCESS_TOKEN) is not set".into(),
            ));
        }
        if self.openai.api_key.is_empty() {
            return Err(crate::error::Error::Config(
                "openai.api_key (OPENAI_API_KEY) is not set".into(),
            ));
        }
        Ok(())
    }
}
