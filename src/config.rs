//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;
use std::time::Duration;

use crate::chains::evm::config::{HistoryConfig, LedgerConfig};
use crate::network::NetworkContext;
use crate::transactions::tracker::TrackerConfig;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ledger: LedgerConfig,
    pub history: HistoryConfig,
    pub network: NetworkConfig,
    pub tracker: TrackerConfig,
    pub logging: LoggingConfig,
}

/// Active network and account
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub network_id: String,
    pub safe_confirmations: u64,
    pub account: Option<String>,
    pub block_poll_interval: Duration,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            ledger: LedgerConfig::from_env()?,
            history: HistoryConfig::from_env()?,
            network: NetworkConfig::from_env()?,
            tracker: TrackerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ledger.validate()?;
        self.history.validate()?;
        self.network.validate()?;
        self.tracker.validate()?;
        self.logging.validate()?;

        Ok(())
    }

    /// Network settings as seen by trackers and the nonce index refresher
    pub fn network_context(&self) -> NetworkContext {
        NetworkContext {
            network_id: self.network.network_id.clone(),
            safe_confirmations: self.network.safe_confirmations,
            history_api_url: self.history.api_url.clone(),
            history_api_key: self.history.api_key.clone(),
        }
    }
}

impl NetworkConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(NetworkConfig {
            network_id: env::var("NETWORK_ID").unwrap_or_else(|_| "1".to_string()),
            safe_confirmations: env::var("SAFE_CONFIRMATIONS")
                .unwrap_or_else(|_| "12".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SAFE_CONFIRMATIONS".to_string()))?,
            account: env::var("ACCOUNT_ADDRESS")
                .ok()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            block_poll_interval: Duration::from_millis(
                env::var("BLOCK_POLL_INTERVAL_MS")
                    .unwrap_or_else(|_| "4000".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("BLOCK_POLL_INTERVAL_MS".to_string()))?,
            ),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network_id.is_empty() {
            return Err(ConfigError::InvalidValue("NETWORK_ID".to_string()));
        }

        if self.block_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "BLOCK_POLL_INTERVAL_MS cannot be 0".to_string(),
            ));
        }

        if let Some(account) = &self.account {
            if !account.starts_with("0x") {
                return Err(ConfigError::InvalidValue(
                    "ACCOUNT_ADDRESS must be 0x-prefixed".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            format: LogFormat::Plain,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}
