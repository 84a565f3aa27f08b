//! Configuration loading, validation, and management for DocChat.
//!
//! Loads configuration from `~/.docchat/config.toml` (or the file named by
//! `DOCCHAT_CONFIG`) with environment variable overrides. Validates all
//! settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the Gemini API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Generic override, checked before [`API_KEY_ENV`].
pub const API_KEY_OVERRIDE_ENV: &str = "DOCCHAT_API_KEY";

/// Names an alternative config file.
pub const CONFIG_PATH_ENV: &str = "DOCCHAT_CONFIG";

/// Load a `.env` file from the working directory (or the nearest parent)
/// into the process environment. Variables that are already set win.
///
/// Returns the file that was read, if any. Call before [`AppConfig::load`].
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => Some(path),
        Err(e) if e.not_found() => None,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable .env file");
            None
        }
    }
}

/// The root configuration structure.
///
/// Maps directly to `~/.docchat/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation service API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Generation service settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Document upload settings
    #[serde(default)]
    pub documents: DocumentsConfig,

    /// Prompt construction settings
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
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
            .field("generation", &self.generation)
            .field("database", &self.database)
            .field("documents", &self.documents)
            .field("prompt", &self.prompt)
            .field("gateway", &self.gateway)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Hard timeout for one generation call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

fn default_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            temperature: None,
            max_output_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path. Relative paths resolve against the config dir.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "users.db".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Instruction placed before the document text
    #[serde(default = "default_preamble")]
    pub preamble: String,
}

pub fn default_preamble() -> String {
    "Based on the following document content, answer the user's question.".into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            preamble: default_preamble(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default)]
    pub allow_public_bind: bool,

    /// Idle sessions older than this are dropped
    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: u64,
}

fn default_port() -> u16 {
    8501
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_session_ttl_minutes() -> u64 {
    120
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allow_public_bind: false,
            session_ttl_minutes: default_session_ttl_minutes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.docchat/config.toml),
    /// or from `DOCCHAT_CONFIG` when set.
    ///
    /// Also checks environment variables:
    /// - `DOCCHAT_API_KEY` (highest priority)
    /// - `GEMINI_API_KEY`
    /// - `DOCCHAT_MODEL`
    /// - `DOCCHAT_DB_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

    /// Apply environment overrides using `lookup` (injectable for tests).
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(API_KEY_OVERRIDE_ENV).or_else(|| non_empty(API_KEY_ENV)) {
            self.api_key = Some(key);
        }
        if let Some(model) = non_empty("DOCCHAT_MODEL") {
            self.generation.model = model;
        }
        if let Some(path) = non_empty("DOCCHAT_DB_PATH") {
            self.database.path = path;
        }
    }

    /// The config file [`load`](Self::load) reads: `DOCCHAT_CONFIG` when set,
    /// else `~/.docchat/config.toml`.
    pub fn config_path() -> PathBuf {
        Self::config_path_from(|key| std::env::var(key).ok())
    }

    fn config_path_from(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
        lookup(CONFIG_PATH_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("config.toml"))
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".docchat")
    }

    /// Resolve the database path: absolute paths and `sqlite:` URLs are used
    /// as-is, relative paths land in the config directory.
    pub fn database_url(&self) -> String {
        let raw = &self.database.path;
        if raw.starts_with("sqlite:") || Path::new(raw).is_absolute() {
            raw.clone()
        } else {
            Self::config_dir().join(raw).display().to_string()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "generation.model must not be empty".into(),
            ));
        }

        if !self.generation.base_url.starts_with("http://")
            && !self.generation.base_url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(
                "generation.base_url must be an http(s) URL".into(),
            ));
        }

        if self.generation.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "generation.timeout_secs must be > 0".into(),
            ));
        }

        if let Some(t) = self.generation.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(
                    "generation.temperature must be between 0.0 and 2.0".into(),
                ));
            }
        }

        if self.documents.max_upload_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "documents.max_upload_bytes must be > 0".into(),
            ));
        }

        if !self.gateway.allow_public_bind && !is_loopback(&self.gateway.host) {
            return Err(ConfigError::ValidationError(format!(
                "gateway.host '{}' is not a loopback address; set gateway.allow_public_bind = true to expose it",
                self.gateway.host
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Return the API key or fail fast with [`ConfigError::MissingApiKey`].
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            generation: GenerationConfig::default(),
            database: DatabaseConfig::default(),
            documents: DocumentsConfig::default(),
            prompt: PromptConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

fn is_loopback(host: &str) -> bool {
    matches!(host, "127.0.0.1" | "localhost" | "::1")
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

    #[error("{API_KEY_ENV} not found. Please set your environment variable.")]
    MissingApiKey,
}

impl From<ConfigError> for docchat_core::Error {
    fn from(e: ConfigError) -> Self {
        docchat_core::Error::Config {
            message: e.to_string(),
        }
    }
}
