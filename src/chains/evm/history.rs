use crate::chains::evm::{
    config::HistoryConfig,
    errors::{EvmError, EvmResult},
    types::{ExplorerResponse, ExplorerTransaction},
};
use crate::chains::traits::{HistoricalTransaction, HistoryError, HistoryService};
use crate::network::NetworkContext;
use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::time::timeout;
use tracing::{debug, info};

/// Explorer message for an account without any transactions in the window
const NO_TRANSACTIONS_FOUND: &str = "No transactions found";

/// History service backed by an Etherscan-compatible explorer API
///
/// The endpoint and key come from the network passed to each call, so one
/// client serves every network. `HistoryConfig` only seeds the start-up
/// network and sets the request timeout.
#[derive(Debug, Clone)]
pub struct ExplorerHistoryClient {
    http_client: Client,
    config: HistoryConfig,
}

impl ExplorerHistoryClient {
    pub fn new(config: HistoryConfig) -> EvmResult<Self> {
        config
            .validate()
            .map_err(|e| EvmError::config_error(e.to_string()))?;

        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent("tx-tracker/0.1")
            .build()
            .map_err(|e| EvmError::config_error(format!("Failed to create HTTP client: {}", e)))?;

        info!(api_url = %config.api_url, "history client initialized");

        Ok(Self {
            http_client,
            config,
        })
    }

    fn txlist_url(
        &self,
        network: &NetworkContext,
        address: &str,
        from_block: u64,
    ) -> EvmResult<Url> {
        let start_block = from_block.to_string();
        let mut params = vec![
            ("module", "account"),
            ("action", "txlist"),
            ("address", address),
            ("startblock", start_block.as_str()),
            ("sort", "desc"),
        ];
        if let Some(api_key) = network.history_api_key.as_deref() {
            params.push(("apikey", api_key));
        }
        Url::parse_with_params(&network.history_api_url, &params)
            .map_err(|e| EvmError::config_error(format!("Invalid history API URL: {}", e)))
    }

    /// Transactions sent by `address` from `from_block` on, newest first.
    pub async fn txlist(
        &self,
        network: &NetworkContext,
        address: &str,
        from_block: u64,
    ) -> EvmResult<Vec<HistoricalTransaction>> {
        let url = self.txlist_url(network, address, from_block)?;
        debug!(
            network_id = %network.network_id,
            address,
            from_block,
            "fetching account history"
        );

        let response = timeout(self.config.request_timeout, self.http_client.get(url).send())
            .await
            .map_err(|_| EvmError::timeout_error(self.config.request_timeout.as_secs()))??;
        let response = response.error_for_status()?;
        let body: ExplorerResponse = response.json().await?;

        if body.status != "1" {
            if body.message.starts_with(NO_TRANSACTIONS_FOUND) {
                return Ok(Vec::new());
            }
            let detail = body
                .result
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| body.message.clone());
            return Err(EvmError::explorer_error(format!("{}: {}", body.message, detail)));
        }

        let records: Vec<ExplorerTransaction> = serde_json::from_value(body.result)?;
        let transactions = records
            .into_iter()
            .map(HistoricalTransaction::try_from)
            .collect::<EvmResult<Vec<_>>>()?;

        debug!(address, count = transactions.len(), "account history fetched");
        Ok(transactions)
    }
}

#[async_trait]
impl HistoryService for ExplorerHistoryClient {
    async fn list_transactions(
        &self,
        network: &NetworkContext,
        address: &str,
        from_block: u64,
    ) -> Result<Vec<HistoricalTransaction>, HistoryError> {
        Ok(self.txlist(network, address, from_block).await?)
    }
}
