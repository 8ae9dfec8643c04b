use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::network::NetworkContext;

/// Receipt status reported by the ledger for a successfully executed transaction.
pub const RECEIPT_SUCCESS_CODE: &str = "0x1";

/// Substring the wallet puts in its error when the user declines to sign.
pub const USER_DENIED_SIGNATURE: &str = "User denied transaction signature";

/// A transaction as returned by lookup-by-hash (mempool or mined)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Transaction hash
    pub hash: String,
    /// Sender nonce
    pub nonce: u64,
    /// Call data (hex, `0x` prefixed)
    pub input: String,
    /// Block the transaction was mined in, if any
    pub block_number: Option<u64>,
}

/// Outcome record of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Hash of the transaction this receipt belongs to
    pub transaction_hash: String,
    /// Raw status code (`0x1` on success)
    pub status: String,
    /// Block number, absent while the receipt is still pending
    pub block_number: Option<u64>,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case(RECEIPT_SUCCESS_CODE)
    }
}

/// A previously broadcast transaction reported by the history service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalTransaction {
    pub hash: String,
    pub nonce: u64,
    pub call_data: String,
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors surfaced by a ledger client after broadcast
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Ledger RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("Operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Malformed ledger response: {message}")]
    InvalidResponse { message: String },
}

/// Errors raised before a transaction reaches the network
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignerError {
    #[error("{message}")]
    Rejected { message: String },

    #[error("Broadcast failed: {message}")]
    BroadcastFailed { message: String },
}

impl SignerError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn broadcast_failed(message: impl Into<String>) -> Self {
        Self::BroadcastFailed {
            message: message.into(),
        }
    }

    /// True when the wallet reports that the user declined to sign.
    pub fn is_user_denied(&self) -> bool {
        self.to_string().contains(USER_DENIED_SIGNATURE)
    }
}

/// Errors surfaced by the history service
#[derive(Debug, Clone, thiserror::Error)]
pub enum HistoryError {
    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("History API error: {message}")]
    ApiError { message: String },

    #[error("Malformed history response: {message}")]
    InvalidResponse { message: String },
}

/// Read access to the ledger plus raw broadcast
///
/// Signing is not part of this interface: `send_raw_transaction` accepts a
/// transaction that has already been signed elsewhere.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Look a transaction up by hash; `None` while it is not visible yet
    async fn get_transaction(&self, tx_hash: &str) -> LedgerResult<Option<LedgerTransaction>>;

    /// Fetch the receipt of a transaction; `None` while it is not mined
    async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> LedgerResult<Option<TransactionReceipt>>;

    /// Current block height
    async fn block_number(&self) -> LedgerResult<u64>;

    /// Broadcast an already signed transaction and return its hash
    async fn send_raw_transaction(&self, raw_tx: &str) -> Result<String, SignerError>;
}

/// Address history lookup (explorer style)
#[async_trait]
pub trait HistoryService: Send + Sync {
    /// List transactions sent by `address` from `from_block` on, newest first,
    /// using the history endpoint of `network`
    async fn list_transactions(
        &self,
        network: &NetworkContext,
        address: &str,
        from_block: u64,
    ) -> Result<Vec<HistoricalTransaction>, HistoryError>;
}
