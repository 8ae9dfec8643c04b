//! Wire types for the JSON-RPC node and the explorer API

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::chains::evm::errors::{EvmError, EvmResult};
use crate::chains::traits::{HistoricalTransaction, LedgerTransaction, TransactionReceipt};

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: JsonValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: JsonValue,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// `eth_getTransactionByHash` result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: String,
    pub nonce: String,
    #[serde(default)]
    pub input: String,
    pub block_number: Option<String>,
}

impl TryFrom<RpcTransaction> for LedgerTransaction {
    type Error = EvmError;

    fn try_from(tx: RpcTransaction) -> EvmResult<Self> {
        Ok(LedgerTransaction {
            nonce: parse_quantity(&tx.nonce)?,
            block_number: tx.block_number.as_deref().map(parse_quantity).transpose()?,
            hash: tx.hash,
            input: tx.input,
        })
    }
}

/// `eth_getTransactionReceipt` result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: String,
    /// Absent on pre-Byzantium receipts
    pub status: Option<String>,
    pub block_number: Option<String>,
}

impl TryFrom<RpcReceipt> for TransactionReceipt {
    type Error = EvmError;

    fn try_from(receipt: RpcReceipt) -> EvmResult<Self> {
        Ok(TransactionReceipt {
            block_number: receipt
                .block_number
                .as_deref()
                .map(parse_quantity)
                .transpose()?,
            transaction_hash: receipt.transaction_hash,
            status: receipt.status.unwrap_or_default(),
        })
    }
}

/// Envelope of every explorer API response
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerResponse {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub result: JsonValue,
}

/// One entry of the explorer `txlist` action
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerTransaction {
    pub hash: String,
    /// Decimal string
    pub nonce: String,
    #[serde(default)]
    pub input: String,
}

impl TryFrom<ExplorerTransaction> for HistoricalTransaction {
    type Error = EvmError;

    fn try_from(tx: ExplorerTransaction) -> EvmResult<Self> {
        let nonce = tx.nonce.parse::<u64>().map_err(|_| {
            EvmError::serialization_error(format!("invalid nonce '{}' for {}", tx.nonce, tx.hash))
        })?;
        Ok(HistoricalTransaction {
            hash: tx.hash,
            nonce,
            call_data: tx.input,
        })
    }
}

/// Decode a `0x`-prefixed hex quantity.
pub fn parse_quantity(value: &str) -> EvmResult<u64> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| EvmError::serialization_error(format!("quantity without 0x prefix: {}", value)))?;
    if digits.is_empty() {
        return Err(EvmError::serialization_error("empty hex quantity"));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| EvmError::serialization_error(format!("invalid hex quantity {}: {}", value, e)))
}
