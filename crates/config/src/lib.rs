//! Configuration loading, validation, and management for Colloquy.
//!
//! Loads configuration from `~/.colloquy/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use colloquy_core::GenerationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.colloquy/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Service credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the chat service
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request network timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Preamble for conversations started from the CLI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_preamble: Option<String>,

    /// Default model per endpoint
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Sampling parameters sent with every chat call
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Reply length budget
    #[serde(default)]
    pub limiter: LimiterConfig,
}

fn default_api_url() -> String {
    "https://api.cohere.com/v1".into()
}
fn default_request_timeout_secs() -> u64 {
    120
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("default_preamble", &self.default_preamble)
            .field("endpoints", &self.endpoints)
            .field("generation", &self.generation)
            .field("retry", &self.retry)
            .field("limiter", &self.limiter)
            .finish()
    }
}

/// The model each endpoint should use unless a call names another one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_chat_model")]
    pub chat: String,

    #[serde(default = "default_embed_model")]
    pub embed: String,

    #[serde(default = "default_embed_model")]
    pub classify: String,

    #[serde(default = "default_rerank_model")]
    pub rerank: String,
}

fn default_chat_model() -> String {
    "c4ai-aya-23".into()
}
fn default_embed_model() -> String {
    "embed-multilingual-light-v3.0".into()
}
fn default_rerank_model() -> String {
    "rerank-multilingual-v3.0".into()
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            chat: default_chat_model(),
            embed: default_embed_model(),
            classify: default_embed_model(),
            rerank: default_rerank_model(),
        }
    }
}

impl EndpointsConfig {
    /// `(endpoint name, default model)` pairs, in a stable order.
    pub fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            ("chat", self.chat.as_str()),
            ("embed", self.embed.as_str()),
            ("classify", self.classify.as_str()),
            ("rerank", self.rerank.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_retry_attempts() -> u32 {
    5
}
fn default_initial_backoff_ms() -> u64 {
    300
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// 0 = unbounded
    #[serde(default)]
    pub max_chars: usize,

    /// 0 = unbounded
    #[serde(default)]
    pub max_words: usize,

    #[serde(default = "default_shorten_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_shrink_multiplier")]
    pub shrink_multiplier: f64,
}

fn default_shorten_attempts() -> u32 {
    5
}
fn default_shrink_multiplier() -> f64 {
    0.95
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_chars: 0,
            max_words: 0,
            max_attempts: default_shorten_attempts(),
            shrink_multiplier: default_shrink_multiplier(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.colloquy/config.toml).
    ///
    /// Also checks environment variables for the API key:
    /// - `COLLOQUY_API_KEY` (highest priority)
    /// - `CohereKey`
    /// - `COHERE_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("COLLOQUY_API_KEY")
            .or_else(|| lookup("CohereKey"))
            .or_else(|| lookup("COHERE_API_KEY"))
        {
            self.api_key = Some(key);
        }

        if let Some(url) = lookup("COLLOQUY_API_URL") {
            self.api_url = url;
        }

        if let Some(model) = lookup("COHERE_MODEL") {
            self.endpoints.chat = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".colloquy")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let generation = &self.generation;
        if let Some(t) = generation.temperature {
            if !(0.0..=5.0).contains(&t) {
                return Err(ConfigError::ValidationError(
                    "generation.temperature must be between 0.0 and 5.0".into(),
                ));
            }
        }
        if let Some(k) = generation.k {
            if k > 500 {
                return Err(ConfigError::ValidationError(
                    "generation.k must be between 0 and 500".into(),
                ));
            }
        }
        if let Some(p) = generation.p {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::ValidationError(
                    "generation.p must be between 0.0 and 1.0".into(),
                ));
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "retry.backoff_multiplier must be >= 1.0".into(),
            ));
        }

        let m = self.limiter.shrink_multiplier;
        if !(m > 0.0 && m <= 1.0) {
            return Err(ConfigError::ValidationError(
                "limiter.shrink_multiplier must be in (0.0, 1.0]".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Generate a default config TOML string (for `config --init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
            default_preamble: None,
            endpoints: EndpointsConfig::default(),
            generation: GenerationConfig::default(),
            retry: RetryConfig::default(),
            limiter: LimiterConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
