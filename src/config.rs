//! Configuration for hass-socket

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, ConnectError};
use crate::socket::{ConnectOptions, LongLivedToken, RetryBudget};

/// Default config file location
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hass-socket")
        .join("config.toml")
}

/// Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Home Assistant URL, e.g. http://homeassistant.local:8123
    #[serde(default)]
    pub hass_url: String,

    /// Long-lived access token
    #[serde(default)]
    pub access_token: String,

    /// Accept self-signed or otherwise invalid server certificates
    #[serde(default)]
    pub ignore_certificates: bool,

    /// Attempts after the first (-1 = unlimited)
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,

    /// Delay between attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_retries() -> i64 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hass_url: String::new(),
            access_token: String::new(),
            ignore_certificates: false,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Options for `create_socket`
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            ignore_certificates: self.ignore_certificates,
            max_retries: RetryBudget::from_signed(self.max_retries),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// Auth provider for the configured instance.
    ///
    /// Fails with `HostRequired` when no usable URL is set.
    pub fn auth(&self) -> Result<LongLivedToken, ConnectError> {
        LongLivedToken::new(&self.hass_url, self.access_token.clone())
    }
}
