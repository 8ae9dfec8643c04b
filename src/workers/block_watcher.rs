//! Block watcher worker
//!
//! Polls the ledger for the chain head and pushes every new height into the
//! [`ChainContext`], which fans it out to trackers and the nonce index
//! refresher.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::chains::traits::LedgerClient;
use crate::network::ChainContext;
use crate::workers::wait_for_shutdown;

#[derive(Debug, Clone)]
pub struct BlockWatcherConfig {
    /// How often the chain head is polled.
    pub poll_interval: Duration,
}

impl Default for BlockWatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(4),
        }
    }
}

pub struct BlockWatcher {
    ledger: Arc<dyn LedgerClient>,
    context: Arc<ChainContext>,
    config: BlockWatcherConfig,
}

impl BlockWatcher {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        context: Arc<ChainContext>,
        config: BlockWatcherConfig,
    ) -> Self {
        Self {
            ledger,
            context,
            config,
        }
    }

    /// Poll until `shutdown_rx` flips to `true`. The first poll is immediate.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "block watcher started"
        );

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    info!("block watcher stopping");
                    break;
                }
                _ = ticker.tick() => self.poll_once().await,
            }
        }

        info!("block watcher stopped");
    }

    async fn poll_once(&self) {
        match self.ledger.block_number().await {
            Ok(height) => self.context.set_block(height),
            Err(e) => warn!(error = %e, "failed to fetch latest block number"),
        }
    }
}
