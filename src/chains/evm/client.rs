use crate::chains::evm::{
    config::LedgerConfig,
    errors::{EvmError, EvmResult},
    types::{
        parse_quantity, JsonRpcRequest, JsonRpcResponse, RpcReceipt, RpcTransaction,
        JSONRPC_VERSION,
    },
};
use crate::chains::traits::{
    LedgerClient, LedgerResult, LedgerTransaction, SignerError, TransactionReceipt,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Ledger client speaking Ethereum JSON-RPC over HTTP
#[derive(Debug)]
pub struct EvmRpcClient {
    http_client: Client,
    config: LedgerConfig,
    next_id: AtomicU64,
}

impl EvmRpcClient {
    pub fn new(config: LedgerConfig) -> EvmResult<Self> {
        config
            .validate()
            .map_err(|e| EvmError::config_error(e.to_string()))?;

        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent("tx-tracker/0.1")
            .build()
            .map_err(|e| EvmError::config_error(format!("Failed to create HTTP client: {}", e)))?;

        info!(rpc_url = %config.rpc_url, "ledger RPC client initialized");

        Ok(Self {
            http_client,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    /// Send one JSON-RPC call. A `null` result maps to `None`.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: JsonValue,
    ) -> EvmResult<Option<T>> {
        let request = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(method, id = request.id, "sending JSON-RPC request");

        let response = timeout(
            self.config.request_timeout,
            self.http_client
                .post(&self.config.rpc_url)
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| EvmError::timeout_error(self.config.request_timeout.as_secs()))??;

        let response = response.error_for_status()?;
        let body: JsonRpcResponse = response.json().await?;

        if let Some(error) = body.error {
            warn!(method, code = error.code, message = %error.message, "JSON-RPC call failed");
            return Err(EvmError::RpcError {
                code: error.code,
                message: error.message,
            });
        }
        if body.result.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(body.result)?))
    }

    pub async fn transaction_by_hash(&self, tx_hash: &str) -> EvmResult<Option<LedgerTransaction>> {
        self.call::<RpcTransaction>("eth_getTransactionByHash", json!([tx_hash]))
            .await?
            .map(LedgerTransaction::try_from)
            .transpose()
    }

    pub async fn transaction_receipt(&self, tx_hash: &str) -> EvmResult<Option<TransactionReceipt>> {
        self.call::<RpcReceipt>("eth_getTransactionReceipt", json!([tx_hash]))
            .await?
            .map(TransactionReceipt::try_from)
            .transpose()
    }

    pub async fn latest_block(&self) -> EvmResult<u64> {
        let height = self
            .call::<String>("eth_blockNumber", json!([]))
            .await?
            .ok_or_else(|| EvmError::serialization_error("eth_blockNumber returned null"))?;
        parse_quantity(&height)
    }

    pub async fn send_raw(&self, raw_tx: &str) -> EvmResult<String> {
        let tx_hash = self
            .call::<String>("eth_sendRawTransaction", json!([raw_tx]))
            .await?
            .ok_or_else(|| EvmError::serialization_error("eth_sendRawTransaction returned null"))?;
        info!(tx_hash = %tx_hash, "raw transaction accepted by node");
        Ok(tx_hash)
    }
}

#[async_trait]
impl LedgerClient for EvmRpcClient {
    async fn get_transaction(&self, tx_hash: &str) -> LedgerResult<Option<LedgerTransaction>> {
        Ok(self.transaction_by_hash(tx_hash).await?)
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> LedgerResult<Option<TransactionReceipt>> {
        Ok(self.transaction_receipt(tx_hash).await?)
    }

    async fn block_number(&self) -> LedgerResult<u64> {
        Ok(self.latest_block().await?)
    }

    async fn send_raw_transaction(&self, raw_tx: &str) -> Result<String, SignerError> {
        Ok(self.send_raw(raw_tx).await?)
    }
}
