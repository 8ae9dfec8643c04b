use std::sync::Arc;

use anyhow::Context;
use futures::future::join_all;
use serde_json::json;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use tx_tracker::chains::evm::client::EvmRpcClient;
use tx_tracker::chains::evm::history::ExplorerHistoryClient;
use tx_tracker::chains::traits::{HistoryService, LedgerClient};
use tx_tracker::config::AppConfig;
use tx_tracker::logging::init_tracing;
use tx_tracker::network::{ChainContext, ContextProvider};
use tx_tracker::transactions::nonce_index::NonceIndexPublisher;
use tx_tracker::transactions::{get_tx_hash, TransactionRegistry, TransactionTracker};
use tx_tracker::workers::block_watcher::{BlockWatcher, BlockWatcherConfig};
use tx_tracker::workers::nonce_index_refresher::NonceIndexRefresher;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config.logging);
    config.validate().context("invalid configuration")?;

    info!(
        network_id = %config.network.network_id,
        safe_confirmations = config.network.safe_confirmations,
        account = config.network.account.as_deref().unwrap_or("-"),
        "starting transaction tracker"
    );

    let rpc_client = Arc::new(EvmRpcClient::new(config.ledger.clone())?);
    let ledger: Arc<dyn LedgerClient> = rpc_client.clone();
    let history: Arc<dyn HistoryService> =
        Arc::new(ExplorerHistoryClient::new(config.history.clone())?);
    let chain_context = Arc::new(ChainContext::new(
        config.network_context(),
        config.network.account.clone(),
    ));
    let context: Arc<dyn ContextProvider> = chain_context.clone();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let block_watcher = BlockWatcher::new(
        ledger.clone(),
        chain_context.clone(),
        BlockWatcherConfig {
            poll_interval: config.network.block_poll_interval,
        },
    );
    let (publisher, nonce_index) = NonceIndexPublisher::new();
    let refresher = NonceIndexRefresher::new(history, context.clone(), publisher);

    let workers = vec![
        tokio::spawn(block_watcher.run(shutdown_rx.clone())),
        tokio::spawn(refresher.run(shutdown_rx.clone())),
    ];

    let registry = TransactionRegistry::new();
    let tracker = TransactionTracker::new(
        ledger,
        context.clone(),
        nonce_index,
        registry.clone(),
        config.tracker.clone(),
        shutdown_rx.clone(),
    );

    let mut view = registry.view(context);
    let view_logger = tokio::spawn(async move {
        while view.changed().await.is_ok() {
            let transactions = view.borrow_and_update().clone();
            for tx in transactions.iter().filter(|t| !t.dismissed) {
                info!(
                    tx_no = tx.tx_no,
                    status = %tx.status(),
                    tx_hash = get_tx_hash(tx).unwrap_or("-"),
                    "transaction"
                );
            }
        }
    });

    let mut tracked = None;
    if let Ok(raw_tx) = std::env::var("RAW_TX") {
        match config.network.account.clone() {
            Some(account) => {
                let client = rpc_client.clone();
                let handle = tracker.submit(
                    account,
                    config.network.network_id.clone(),
                    json!({ "source": "RAW_TX" }),
                    async move { client.send_raw_transaction(&raw_tx).await },
                );
                info!(tx_no = handle.tx_no(), "raw transaction submitted");
                tracked = Some(handle);
            }
            None => warn!("RAW_TX is set but ACCOUNT_ADDRESS is not, skipping submission"),
        }
    }

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    for result in join_all(workers).await {
        if let Err(e) = result {
            error!(error = %e, "worker task failed");
        }
    }
    if let Some(handle) = tracked {
        let last = handle.finished().await;
        info!(tx_no = last.tx_no, status = %last.status(), "last known transaction state");
    }
    view_logger.abort();

    info!("transaction tracker stopped");
    Ok(())
}
