use thiserror::Error;

use crate::chains::traits::{HistoryError, LedgerError, SignerError};

pub type EvmResult<T> = Result<T, EvmError>;

#[derive(Debug, Error)]
pub enum EvmError {
    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Rate limit exceeded. Please try again later")]
    RateLimitError,

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    #[error("Timeout error: operation timed out after {seconds} seconds")]
    TimeoutError { seconds: u64 },

    #[error("JSON-RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("Explorer API error: {message}")]
    ExplorerError { message: String },
}

impl EvmError {
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    pub fn timeout_error(seconds: u64) -> Self {
        Self::TimeoutError { seconds }
    }

    pub fn explorer_error(message: impl Into<String>) -> Self {
        Self::ExplorerError {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for EvmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EvmError::timeout_error(0)
        } else if err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            EvmError::RateLimitError
        } else {
            EvmError::network_error(format!("Request error: {}", err))
        }
    }
}

impl From<serde_json::Error> for EvmError {
    fn from(err: serde_json::Error) -> Self {
        EvmError::serialization_error(format!("JSON error: {}", err))
    }
}

impl From<EvmError> for LedgerError {
    fn from(err: EvmError) -> Self {
        match err {
            EvmError::TimeoutError { seconds } => LedgerError::Timeout { seconds },
            EvmError::RpcError { code, message } => LedgerError::RpcError { code, message },
            EvmError::SerializationError { message } => LedgerError::InvalidResponse { message },
            other => LedgerError::NetworkError {
                message: other.to_string(),
            },
        }
    }
}

impl From<EvmError> for HistoryError {
    fn from(err: EvmError) -> Self {
        match err {
            EvmError::ExplorerError { message } => HistoryError::ApiError { message },
            EvmError::SerializationError { message } => HistoryError::InvalidResponse { message },
            other => HistoryError::NetworkError {
                message: other.to_string(),
            },
        }
    }
}

impl From<EvmError> for SignerError {
    fn from(err: EvmError) -> Self {
        match err {
            EvmError::RpcError { message, .. } => SignerError::broadcast_failed(message),
            other => SignerError::broadcast_failed(other.to_string()),
        }
    }
}
