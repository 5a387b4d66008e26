//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Service types a bot can be backed by.
pub const SUPPORTED_SERVICE_TYPES: &[&str] = &["anthropic"];

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bot used when a request does not name one
    #[serde(default = "default_bot_name")]
    pub default_bot_name: String,

    /// Log full provider requests and responses at trace level
    #[serde(default)]
    pub enable_llm_trace: bool,

    /// Configured bots
    #[serde(default = "default_bots")]
    pub bots: Vec<BotConfig>,
}

/// A named bot persona backed by one LLM service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub name: String,

    #[serde(default)]
    pub display_name: String,

    /// Extra instructions appended to the system prompt
    #[serde(default)]
    pub custom_instructions: String,

    pub service: ServiceConfig,
}

/// Connection settings for one LLM service.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Provider kind, e.g. "anthropic"
    #[serde(rename = "type", default = "default_service_type")]
    pub service_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub default_model: String,

    /// Override the provider's base URL (proxies, tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Context window in tokens; provider default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_limit: Option<usize>,

    /// Maximum silence between stream chunks; 0 disables the timeout
    #[serde(default)]
    pub streaming_timeout_seconds: u64,
}

fn default_bot_name() -> String {
    "assistant".into()
}
fn default_service_type() -> String {
    "anthropic".into()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_bots() -> Vec<BotConfig> {
    vec![BotConfig::default()]
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("service_type", &self.service_type)
            .field("api_key", &redact(&self.api_key))
            .field("default_model", &self.default_model)
            .field("api_url", &self.api_url)
            .field("token_limit", &self.token_limit)
            .field("streaming_timeout_seconds", &self.streaming_timeout_seconds)
            .finish()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_type: default_service_type(),
            api_key: None,
            default_model: default_model(),
            api_url: None,
            token_limit: None,
            streaming_timeout_seconds: 0,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            display_name: "Assistant".into(),
            custom_instructions: String::new(),
            service: ServiceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Environment overrides:
    /// - `PARLEY_API_KEY`, then `ANTHROPIC_API_KEY`: key for bots without one
    /// - `PARLEY_BOT`: default bot name
    /// - `PARLEY_MODEL`: model of the default bot
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        let env_key = std::env::var("PARLEY_API_KEY")
            .ok()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
        if let Some(key) = env_key {
            for bot in config.bots.iter_mut().filter(|b| b.service.api_key.is_none()) {
                bot.service.api_key = Some(key.clone());
            }
        }

        if let Ok(bot) = std::env::var("PARLEY_BOT") {
            config.default_bot_name = bot;
        }

        if let Ok(model) = std::env::var("PARLEY_MODEL") {
            let default_name = config.default_bot_name.clone();
            if let Some(bot) = config.bots.iter_mut().find(|b| b.name == default_name) {
                bot.service.default_model = model;
            }
        }

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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for bot in &self.bots {
            if bot.name.trim().is_empty() {
                return Err(ConfigError::ValidationError("bot name must not be empty".into()));
            }
            if !seen.insert(bot.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate bot name '{}'",
                    bot.name
                )));
            }
            if !SUPPORTED_SERVICE_TYPES.contains(&bot.service.service_type.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "bot '{}' uses unsupported service type '{}'",
                    bot.name, bot.service.service_type
                )));
            }
        }

        if !self.bots.is_empty() && self.bot(&self.default_bot_name).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "default_bot_name '{}' does not match any bot",
                self.default_bot_name
            )));
        }

        Ok(())
    }

    /// Look up a bot by name.
    pub fn bot(&self, name: &str) -> Option<&BotConfig> {
        self.bots.iter().find(|b| b.name == name)
    }

    /// The bot named by `default_bot_name`.
    pub fn default_bot(&self) -> Option<&BotConfig> {
        self.bot(&self.default_bot_name)
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
            default_bot_name: default_bot_name(),
            enable_llm_trace: false,
            bots: default_bots(),
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
