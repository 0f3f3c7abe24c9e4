//! # Configuration Management Module
//!
//! Settings for the bot, its storage and logging, loaded from a TOML file and
//! optionally overridden from the environment.
//!
//! ## Configuration Structure
//!
//! - [`BotConfig`] - Bot credential, allow-list, hosting endpoint and polling settings
//! - [`StorageConfig`] - Where the ledger database lives
//! - [`LoggingConfig`] - Log level and log files
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chorebot::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::load("config.toml").await?;
//!     config.apply_env();
//!     println!("Allowed: {:?}", config.bot.allowed_usernames);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [bot]
//! name = "Household Points"
//! token = "123456:ABC..."
//! allowed_usernames = ["alice", "bob"]
//! hostname = "chores.example.org"
//!
//! [storage]
//! data_dir = "./data"
//!
//! [logging]
//! level = "info"
//! file = "chorebot.log"
//! ```
//!
//! ## Environment Integration
//!
//! `TELEGRAM_BOT_TOKEN`, `ALLOWED_USERNAMES` (space separated) and `APP_HOSTNAME`
//! override the corresponding file values when set and non-empty.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_ALLOWED_USERNAMES: &str = "ALLOWED_USERNAMES";
pub const ENV_HOSTNAME: &str = "APP_HOSTNAME";

/// What to do when an unregistered user presses a redemption button.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnregisteredCallbacks {
    /// Acknowledge the press and change nothing on screen.
    #[default]
    Ignore,
    /// Replace the prompt with the not-registered notice.
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub name: String,
    /// Bot API credential. Usually supplied through `TELEGRAM_BOT_TOKEN` instead.
    #[serde(default)]
    pub token: String,
    /// Chat handles permitted to `/register`.
    #[serde(default)]
    pub allowed_usernames: Vec<String>,
    /// Public host the webhook points at, e.g. `chores.example.org`.
    #[serde(default)]
    pub hostname: String,
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
    /// Long-poll wait passed to getUpdates.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    /// Per-request HTTP timeout; must exceed the poll timeout.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub unregistered_callbacks: UnregisteredCallbacks,
    /// Longest reply the bot will send, in UTF-16 code units (Bot API `sendMessage` limit).
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
    /// Override for the Bot API base URL (self-hosted Bot API servers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

fn default_webhook_path() -> String {
    "/telegram".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_http_timeout_secs() -> u64 {
    40
}

fn default_max_message_chars() -> usize {
    4096
}

/// Smallest `max_message_chars` that still fits a history header and its trailer.
pub const MIN_MESSAGE_CHARS: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl StorageConfig {
    /// Directory of the sled database.
    pub fn ledger_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("ledger")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    #[serde(default)]
    pub security_file: Option<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bot: BotConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl BotConfig {
    /// Allow-list check. Handles compare case-insensitively and ignore a leading `@`.
    pub fn is_allowed(&self, username: &str) -> bool {
        let wanted = username.trim().trim_start_matches('@');
        !wanted.is_empty()
            && self
                .allowed_usernames
                .iter()
                .any(|u| u.trim().trim_start_matches('@').eq_ignore_ascii_case(wanted))
    }

    /// Webhook target derived from `hostname` and `webhook_path`.
    pub fn webhook_url(&self) -> Option<String> {
        let host = self.hostname.trim().trim_end_matches('/');
        if host.is_empty() {
            return None;
        }
        let path = self.webhook_path.trim();
        let host = host
            .strip_prefix("https://")
            .or_else(|| host.strip_prefix("http://"))
            .unwrap_or(host);
        if path.starts_with('/') {
            Some(format!("https://{}{}", host, path))
        } else {
            Some(format!("https://{}/{}", host, path))
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup; empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(token) = get(ENV_BOT_TOKEN) {
            self.bot.token = token.trim().to_string();
        }
        if let Some(list) = get(ENV_ALLOWED_USERNAMES) {
            self.bot.allowed_usernames = list.split_whitespace().map(str::to_string).collect();
        }
        if let Some(host) = get(ENV_HOSTNAME) {
            self.bot.hostname = host.trim().to_string();
        }
    }

    /// Checks needed before talking to the Bot API.
    pub fn validate(&self) -> Result<()> {
        if self.bot.token.trim().is_empty() {
            return Err(anyhow!(
                "Bot token missing: set bot.token or {}",
                ENV_BOT_TOKEN
            ));
        }
        if self.bot.http_timeout_secs <= self.bot.poll_timeout_secs {
            return Err(anyhow!(
                "bot.http_timeout_secs ({}) must be greater than bot.poll_timeout_secs ({})",
                self.bot.http_timeout_secs,
                self.bot.poll_timeout_secs
            ));
        }
        if self.bot.max_message_chars < MIN_MESSAGE_CHARS {
            return Err(anyhow!(
                "bot.max_message_chars ({}) must be at least {}",
                self.bot.max_message_chars,
                MIN_MESSAGE_CHARS
            ));
        }
        if self.bot.allowed_usernames.is_empty() {
            log::warn!("Allow-list is empty; nobody will be able to /register");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bot: BotConfig {
                name: "Household Points".to_string(),
                token: String::new(),
                allowed_usernames: Vec::new(),
                hostname: String::new(),
                webhook_path: default_webhook_path(),
                poll_timeout_secs: default_poll_timeout_secs(),
                http_timeout_secs: default_http_timeout_secs(),
                unregistered_callbacks: UnregisteredCallbacks::Ignore,
                max_message_chars: default_max_message_chars(),
                api_base: None,
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("chorebot.log".to_string()),
                security_file: Some("chorebot-security.log".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.bot.webhook_path, "/telegram");
        assert_eq!(parsed.bot.unregistered_callbacks, UnregisteredCallbacks::Ignore);
        assert_eq!(parsed.storage.data_dir, "./data");
    }

    #[test]
    fn minimal_file_fills_defaults() {
        let text = r#"
            [bot]
            name = "Home"
            allowed_usernames = ["alice"]
            unregistered_callbacks = "reject"

            [storage]
            data_dir = "/tmp/chores"

            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.bot.poll_timeout_secs, 30);
        assert_eq!(config.bot.http_timeout_secs, 40);
        assert_eq!(config.bot.max_message_chars, 4096);
        assert_eq!(config.bot.unregistered_callbacks, UnregisteredCallbacks::Reject);
        assert!(config.logging.file.is_none());
        assert_eq!(
            config.storage.ledger_path(),
            PathBuf::from("/tmp/chores").join("ledger")
        );
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = Config::default();
        config.bot.allowed_usernames = vec!["old".into()];
        let env: HashMap<&str, &str> = [
            (ENV_BOT_TOKEN, "123:abc"),
            (ENV_ALLOWED_USERNAMES, "alice  bob"),
            (ENV_HOSTNAME, ""),
        ]
        .into_iter()
        .collect();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.bot.token, "123:abc");
        assert_eq!(config.bot.allowed_usernames, vec!["alice", "bob"]);
        assert!(config.bot.hostname.is_empty());
    }

    #[test]
    fn allow_list_ignores_case_and_at_sign() {
        let mut bot = Config::default().bot;
        bot.allowed_usernames = vec!["@Alice".into(), "bob".into()];
        assert!(bot.is_allowed("alice"));
        assert!(bot.is_allowed("@BOB"));
        assert!(!bot.is_allowed("carol"));
        assert!(!bot.is_allowed(""));
    }

    #[test]
    fn webhook_url_is_built_from_hostname() {
        let mut bot = Config::default().bot;
        assert_eq!(bot.webhook_url(), None);
        bot.hostname = "https://chores.example.org/".into();
        assert_eq!(
            bot.webhook_url().as_deref(),
            Some("https://chores.example.org/telegram")
        );
        bot.webhook_path = "hook".into();
        bot.hostname = "chores.example.org".into();
        assert_eq!(
            bot.webhook_url().as_deref(),
            Some("https://chores.example.org/hook")
        );
    }

    #[test]
    fn validate_requires_token_and_sane_timeouts() {
        let mut config = Config::default();
        assert!(config.validate().is_err());
        config.bot.token = "123:abc".into();
        assert!(config.validate().is_ok());
        config.bot.http_timeout_secs = config.bot.poll_timeout_secs;
        assert!(config.validate().is_err());
        config.bot.http_timeout_secs = 40;
        config.bot.max_message_chars = 100;
        assert!(config.validate().is_err());
    }
}
