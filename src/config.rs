//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `relay.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: bind address and request timeout.
//!     - AlertsConfig: Telegram Bot API endpoint and credentials.
//!     - LoggingConfig: default log level (RUST_LOG wins when set).
//!
//! secrets:
//!     TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID override the file so
//!     credentials can live in the environment (or a .env file).
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertsConfig {
    pub enabled: bool,
    pub api_base: String,
    pub bot_token: String,
    pub chat_id: String,
    pub timeout_secs: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            chat_id: String::new(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))
    }

    /// Finds the config file to use.
    ///
    /// An explicit path is returned as-is (and must then load). Otherwise the
    /// first existing of `config/relay.toml`, `../config/relay.toml`.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        [
            PathBuf::from("config").join("relay.toml"),
            PathBuf::from("..").join("config").join("relay.toml"),
        ]
        .into_iter()
        .find(|path| path.exists())
    }

    /// Load with default fallback
    pub fn load_or_default(explicit: Option<&Path>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        match Self::locate(explicit) {
            Some(path) => Ok((Self::load(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Applies TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID when set.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            std::env::var("TELEGRAM_CHAT_ID").ok(),
        );
    }

    fn apply_overrides(&mut self, bot_token: Option<String>, chat_id: Option<String>) {
        if let Some(token) = bot_token.filter(|t| !t.is_empty()) {
            self.alerts.bot_token = token;
        }
        if let Some(chat) = chat_id.filter(|c| !c.is_empty()) {
            self.alerts.chat_id = chat;
        }
    }

    /// Log configuration summary. Never prints the bot token.
    pub fn log_summary(&self) {
        tracing::info!(
            host = %self.server.host,
            port = self.server.port,
            request_timeout_secs = self.server.request_timeout_secs,
            "[CONFIG] server"
        );
        tracing::info!(
            enabled = self.alerts.enabled,
            api_base = %self.alerts.api_base,
            chat_id = %self.alerts.chat_id,
            token_set = !self.alerts.bot_token.is_empty(),
            "[CONFIG] alerts"
        );
    }
}
