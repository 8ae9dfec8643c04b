//! Nonce index refresher worker
//!
//! Keeps the external nonce index in step with the history service. The
//! lookup window starts at the first block height seen after start-up; the
//! index is rebuilt whenever the account, the network or the chain head
//! changes. A failed lookup publishes an empty index so trackers simply see
//! no replacement.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::chains::traits::HistoryService;
use crate::network::ContextProvider;
use crate::transactions::nonce_index::{ExternalNonceIndex, NonceIndexPublisher};
use crate::workers::wait_for_shutdown;

pub struct NonceIndexRefresher {
    history: Arc<dyn HistoryService>,
    context: Arc<dyn ContextProvider>,
    publisher: NonceIndexPublisher,
}

impl NonceIndexRefresher {
    pub fn new(
        history: Arc<dyn HistoryService>,
        context: Arc<dyn ContextProvider>,
        publisher: NonceIndexPublisher,
    ) -> Self {
        Self {
            history,
            context,
            publisher,
        }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut blocks = self.context.subscribe_blocks();
        let mut account = self.context.subscribe_account();
        let mut network = self.context.subscribe_context();

        let window_start = tokio::select! {
            _ = wait_for_shutdown(&mut shutdown_rx) => {
                info!("nonce index refresher stopped before first block");
                return;
            }
            first = blocks.wait_for(Option::is_some) => match first {
                Ok(height) => height.unwrap_or_default(),
                Err(_) => {
                    warn!("block feed closed before first block");
                    return;
                }
            },
        };
        info!(window_start, "nonce index refresher started");

        loop {
            // mark everything seen so only later changes retrigger
            blocks.borrow_and_update();
            account.borrow_and_update();
            network.borrow_and_update();

            self.refresh(window_start).await;

            let closed = tokio::select! {
                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    info!("nonce index refresher stopping");
                    break;
                }
                changed = blocks.changed() => changed.is_err(),
                changed = account.changed() => changed.is_err(),
                changed = network.changed() => changed.is_err(),
            };
            if closed {
                warn!("context feed closed, nonce index refresher stopping");
                break;
            }
        }

        info!("nonce index refresher stopped");
    }

    /// Rebuild the index once for the current account on the current network.
    pub async fn refresh(&self, window_start: u64) {
        let Some(account) = self.context.current_account() else {
            debug!("no active account, publishing empty nonce index");
            self.publisher.publish(ExternalNonceIndex::empty());
            return;
        };

        let network = self.context.current();
        match self
            .history
            .list_transactions(&network, &account, window_start)
            .await
        {
            Ok(transactions) => {
                let index = ExternalNonceIndex::from_history(transactions);
                debug!(
                    account = %account,
                    network_id = %network.network_id,
                    entries = index.len(),
                    "nonce index refreshed"
                );
                self.publisher.publish(index);
            }
            Err(e) => {
                warn!(account = %account, error = %e, "history lookup failed, clearing nonce index");
                self.publisher.publish(ExternalNonceIndex::empty());
            }
        }
    }
}
