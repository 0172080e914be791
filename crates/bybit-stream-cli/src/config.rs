/*
[INPUT]:  YAML configuration file, BYBIT_API_KEY / BYBIT_API_SECRET environment
[OUTPUT]: Parsed stream runner configuration and per-channel connection configs
[POS]:    Configuration layer - runner setup
[UPDATE]: When adding new configuration options
*/

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use bybit_stream_adapter::{ConnectionConfig, Credentials};
use serde::{Deserialize, Serialize};

pub const API_KEY_ENV: &str = "BYBIT_API_KEY";
pub const API_SECRET_ENV: &str = "BYBIT_API_SECRET";

/// Top-level configuration for the stream runner
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Connect to the testnet hosts
    #[serde(default)]
    pub testnet: bool,
    /// Venue category label: spot, usdt_contract, usdc_contract, usdc_futures,
    /// inverse_contract or usdc_option; anything else streams linear
    #[serde(default = "default_category")]
    pub category: String,
    /// Symbols to stream (e.g., "BTCUSDT")
    pub symbols: Vec<String>,
    #[serde(default = "default_kline_interval")]
    pub kline_interval: String,
    /// Order book depth; omitted means no order book subscription
    #[serde(default)]
    pub orderbook_depth: Option<u32>,
    /// Enables the private channel
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,
    /// Directory for a daily rolling log file
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    pub api_key: String,
    pub api_secret: String,
    /// Private session lifetime, e.g. "10m"
    #[serde(default)]
    pub max_active_time: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("max_active_time", &self.max_active_time)
            .finish()
    }
}

/// Keepalive and reconnection tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_reconnect_attempts")]
    pub attempts: u32,
    #[serde(default = "default_reconnect_delay_secs")]
    pub delay_secs: u64,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            attempts: default_reconnect_attempts(),
            delay_secs: default_reconnect_delay_secs(),
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

fn default_category() -> String {
    "usdt_contract".to_string()
}

fn default_kline_interval() -> String {
    "1".to_string()
}

fn default_reconnect_attempts() -> u32 {
    3
}

fn default_reconnect_delay_secs() -> u64 {
    10
}

fn default_ping_interval_secs() -> u64 {
    20
}

impl StreamConfig {
    /// Load configuration from a YAML file, then apply environment credentials
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {path}"))?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_credential_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("parse config yaml")
    }

    /// Replace file credentials when both key and secret are set in the environment
    pub fn apply_credential_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let key = lookup(API_KEY_ENV).filter(|value| !value.is_empty());
        let secret = lookup(API_SECRET_ENV).filter(|value| !value.is_empty());
        if let (Some(api_key), Some(api_secret)) = (key, secret) {
            let max_active_time = self
                .credentials
                .take()
                .and_then(|credentials| credentials.max_active_time);
            self.credentials = Some(CredentialsConfig {
                api_key,
                api_secret,
                max_active_time,
            });
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.symbols.is_empty() && self.credentials.is_none() {
            bail!("config must list symbols or provide credentials");
        }
        if self.symbols.iter().any(|symbol| symbol.trim().is_empty()) {
            bail!("symbols must be non-empty");
        }
        if self.kline_interval.trim().is_empty() {
            bail!("kline_interval must be non-empty");
        }
        if self.reconnect.ping_interval_secs == 0 {
            bail!("reconnect.ping_interval_secs must be greater than zero");
        }
        if let Some(credentials) = &self.credentials
            && (credentials.api_key.is_empty() || credentials.api_secret.is_empty())
        {
            bail!("credentials.api_key and credentials.api_secret must be non-empty");
        }
        Ok(())
    }

    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    /// Public market-data connection; absent when no symbols are configured
    pub fn public_connection(&self) -> Option<ConnectionConfig> {
        if self.symbols.is_empty() {
            return None;
        }
        Some(self.tune(ConnectionConfig::public(
            self.testnet,
            self.category.as_str(),
        )))
    }

    /// Private account connection; absent without credentials
    pub fn private_connection(&self) -> Option<ConnectionConfig> {
        self.credentials.as_ref().map(|credentials| {
            self.tune(ConnectionConfig::private(
                Credentials::new(&credentials.api_key, &credentials.api_secret),
                self.testnet,
                credentials.max_active_time.clone(),
                self.category.as_str(),
            ))
        })
    }

    fn tune(&self, config: ConnectionConfig) -> ConnectionConfig {
        config
            .with_ping_interval(Duration::from_secs(self.reconnect.ping_interval_secs))
            .with_reconnect(
                self.reconnect.attempts,
                Duration::from_secs(self.reconnect.delay_secs),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bybit_stream_adapter::{Category, ChannelKind, Environment};

    const MINIMAL: &str = "symbols: [BTCUSDT, ETHUSDT]\n";

    #[test]
    fn defaults_fill_missing_fields() {
        let config = StreamConfig::from_yaml(MINIMAL).unwrap();
        assert!(!config.testnet);
        assert_eq!(config.category, "usdt_contract");
        assert_eq!(config.kline_interval, "1");
        assert_eq!(config.orderbook_depth, None);
        assert!(config.credentials.is_none());
        assert_eq!(config.reconnect.attempts, 3);
        assert_eq!(config.reconnect.delay_secs, 10);
        assert_eq!(config.reconnect.ping_interval_secs, 20);
        config.validate().unwrap();
    }

    #[test]
    fn env_credentials_need_both_values() {
        let mut config = StreamConfig::from_yaml(MINIMAL).unwrap();
        config.apply_credential_overrides(|name| {
            (name == API_KEY_ENV).then(|| "key".to_string())
        });
        assert!(config.credentials.is_none());

        config.apply_credential_overrides(|name| Some(format!("{name}-value")));
        let credentials = config.credentials.as_ref().unwrap();
        assert_eq!(credentials.api_key, "BYBIT_API_KEY-value");
        assert_eq!(credentials.api_secret, "BYBIT_API_SECRET-value");
    }

    #[test]
    fn env_credentials_keep_file_session_lifetime() {
        let yaml = "symbols: [BTCUSDT]\ncredentials:\n  api_key: file-key\n  api_secret: file-secret\n  max_active_time: 10m\n";
        let mut config = StreamConfig::from_yaml(yaml).unwrap();
        config.apply_credential_overrides(|name| Some(format!("env-{name}")));
        let credentials = config.credentials.unwrap();
        assert_eq!(credentials.api_key, "env-BYBIT_API_KEY");
        assert_eq!(credentials.max_active_time.as_deref(), Some("10m"));
    }

    #[test]
    fn connection_configs_follow_file() {
        let yaml = "testnet: true\ncategory: spot\nsymbols: [BTCUSDT]\nreconnect:\n  attempts: 5\n  delay_secs: 2\n  ping_interval_secs: 15\ncredentials:\n  api_key: k\n  api_secret: s\n";
        let config = StreamConfig::from_yaml(yaml).unwrap();

        let public = config.public_connection().unwrap();
        assert_eq!(public.environment, Environment::Testnet);
        assert_eq!(public.channel, ChannelKind::Public);
        assert_eq!(public.category, Category::Spot);
        assert_eq!(public.reconnect_attempts, 5);
        assert_eq!(public.reconnect_delay, Duration::from_secs(2));
        assert_eq!(public.ping_interval, Duration::from_secs(15));

        let private = config.private_connection().unwrap();
        assert_eq!(private.channel, ChannelKind::Private);
        assert_eq!(private.credentials.unwrap().api_key, "k");
    }

    #[test]
    fn private_only_config_has_no_public_connection() {
        let yaml = "symbols: []\ncredentials:\n  api_key: k\n  api_secret: s\n";
        let config = StreamConfig::from_yaml(yaml).unwrap();
        config.validate().unwrap();
        assert!(config.public_connection().is_none());
        assert!(config.private_connection().is_some());
    }

    #[test]
    fn validation_rejects_empty_setups() {
        let config = StreamConfig::from_yaml("symbols: []\n").unwrap();
        assert!(config.validate().is_err());

        let config = StreamConfig::from_yaml("symbols: [\"\"]\n").unwrap();
        assert!(config.validate().is_err());

        let config =
            StreamConfig::from_yaml("symbols: [BTCUSDT]\nreconnect:\n  ping_interval_secs: 0\n")
                .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let credentials = CredentialsConfig {
            api_key: "visible".to_string(),
            api_secret: "hidden".to_string(),
            max_active_time: None,
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("visible"));
        assert!(!rendered.contains("hidden"));
    }
}
