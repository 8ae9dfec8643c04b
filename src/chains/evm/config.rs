use std::env;
use std::time::Duration;

use crate::config::ConfigError;

/// JSON-RPC endpoint settings for the ledger client
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub rpc_url: String,
    pub request_timeout: Duration,
}

/// Explorer (history service) settings
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.etherscan.io/api".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            rpc_url: env::var("LEDGER_RPC_URL").unwrap_or(defaults.rpc_url),
            request_timeout: Duration::from_secs(
                env::var("LEDGER_REQUEST_TIMEOUT")
                    .unwrap_or_else(|_| defaults.request_timeout.as_secs().to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("LEDGER_REQUEST_TIMEOUT".to_string()))?,
            ),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("LEDGER_RPC_URL", &self.rpc_url)?;
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "LEDGER_REQUEST_TIMEOUT".to_string(),
            ));
        }
        Ok(())
    }
}

impl HistoryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            api_url: env::var("HISTORY_API_URL").unwrap_or(defaults.api_url),
            api_key: env::var("HISTORY_API_KEY").ok().filter(|k| !k.is_empty()),
            request_timeout: Duration::from_secs(
                env::var("HISTORY_REQUEST_TIMEOUT")
                    .unwrap_or_else(|_| defaults.request_timeout.as_secs().to_string())
                    .parse()
                    .map_err(|_| {
                        ConfigError::InvalidValue("HISTORY_REQUEST_TIMEOUT".to_string())
                    })?,
            ),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("HISTORY_API_URL", &self.api_url)?;
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "HISTORY_REQUEST_TIMEOUT".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_url(name: &str, url: &str) -> Result<(), ConfigError> {
    if url.is_empty() {
        return Err(ConfigError::InvalidValue(name.to_string()));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be a valid URL",
            name
        )));
    }
    Ok(())
}
