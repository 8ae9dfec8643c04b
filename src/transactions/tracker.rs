//! Transaction tracker
//!
//! Drives one submitted transaction from wallet approval to a terminal state:
//!
//! ```text
//! WaitingForApproval -> CancelledByTheUser
//!                    -> Propagating -> WaitingForConfirmation -> Failure
//!                                                             -> Error
//!                                                             -> Success (confirmations accrue)
//! ```
//!
//! Every snapshot is published on the tracker's own watch channel and
//! upserted into the [`TransactionRegistry`].

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::chains::traits::{LedgerClient, SignerError};
use crate::config::ConfigError;
use crate::network::{BlockTicks, ContextProvider};
use crate::transactions::nonce_index::{self, NonceIndexReader};
use crate::transactions::registry::TransactionRegistry;
use crate::transactions::replacement::resolve;
use crate::transactions::state::{TxStage, TxState};
use crate::transactions::watcher::{confirmations, wait_for_mempool, wait_for_receipt};
use crate::workers::wait_for_shutdown;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// How often lookup-by-hash is polled while a transaction propagates.
    pub mempool_poll_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            mempool_poll_interval: Duration::from_secs(1),
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            mempool_poll_interval: Duration::from_millis(
                std::env::var("TX_MEMPOOL_POLL_INTERVAL_MS")
                    .unwrap_or_else(|_| defaults.mempool_poll_interval.as_millis().to_string())
                    .parse()
                    .map_err(|_| {
                        ConfigError::InvalidValue("TX_MEMPOOL_POLL_INTERVAL_MS".to_string())
                    })?,
            ),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mempool_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "TX_MEMPOOL_POLL_INTERVAL_MS cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to one tracked transaction
#[derive(Debug)]
pub struct TrackedTx {
    tx_no: u64,
    states: watch::Receiver<TxState>,
    task: JoinHandle<()>,
}

impl TrackedTx {
    pub fn tx_no(&self) -> u64 {
        self.tx_no
    }

    /// Latest snapshot
    pub fn latest(&self) -> TxState {
        self.states.borrow().clone()
    }

    /// New subscriber; sees the latest snapshot first, then every change.
    pub fn subscribe(&self) -> watch::Receiver<TxState> {
        self.states.clone()
    }

    /// Wait for the tracker to stop emitting and return its last snapshot.
    pub async fn finished(self) -> TxState {
        if let Err(e) = self.task.await {
            error!(tx_no = self.tx_no, error = %e, "transaction tracker task failed");
        }
        self.states.borrow().clone()
    }
}

// ---------------------------------------------------------------------------
// Tracker service
// ---------------------------------------------------------------------------

/// Submits transactions and tracks each one to completion
pub struct TransactionTracker {
    ledger: Arc<dyn LedgerClient>,
    context: Arc<dyn ContextProvider>,
    nonce_index: NonceIndexReader,
    registry: TransactionRegistry,
    config: TrackerConfig,
    shutdown_rx: watch::Receiver<bool>,
    tx_counter: AtomicU64,
}

impl TransactionTracker {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        context: Arc<dyn ContextProvider>,
        nonce_index: NonceIndexReader,
        registry: TransactionRegistry,
        config: TrackerConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            ledger,
            context,
            nonce_index,
            registry,
            config,
            shutdown_rx,
            tx_counter: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &TransactionRegistry {
        &self.registry
    }

    /// Track a transaction whose signing and broadcast is performed by `call`.
    ///
    /// The `WaitingForApproval` snapshot is published before this returns.
    /// `call` resolves to the broadcast hash, or to the signer's error.
    pub fn submit<F>(
        &self,
        account: impl Into<String>,
        network_id: impl Into<String>,
        meta: JsonValue,
        call: F,
    ) -> TrackedTx
    where
        F: Future<Output = Result<String, SignerError>> + Send + 'static,
    {
        let tx_no = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        let initial = TxState::waiting_for_approval(account, network_id, tx_no, meta);
        self.registry.upsert(initial.clone());
        let (states_tx, states_rx) = watch::channel(initial.clone());

        info!(
            tx_no,
            account = %initial.account,
            network_id = %initial.network_id,
            "transaction submitted for approval"
        );

        let run = TrackerRun {
            ledger: self.ledger.clone(),
            context: self.context.clone(),
            nonce_index: self.nonce_index.clone(),
            config: self.config.clone(),
            emitter: Emitter {
                states: states_tx,
                registry: self.registry.clone(),
                last: initial,
            },
        };
        let mut shutdown_rx = self.shutdown_rx.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = run.drive(call) => {}
                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    debug!(tx_no, "transaction tracker stopped by shutdown");
                }
            }
        });

        TrackedTx {
            tx_no,
            states: states_rx,
            task,
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Publishes snapshots to the tracker's subscribers and the registry
struct Emitter {
    states: watch::Sender<TxState>,
    registry: TransactionRegistry,
    last: TxState,
}

impl Emitter {
    fn emit(&mut self, stage: TxStage) {
        let next = self.last.advance(stage);
        debug!(tx_no = next.tx_no, status = %next.status(), "transaction state changed");
        self.registry.upsert(next.clone());
        self.states.send_replace(next.clone());
        self.last = next;
    }

    fn tx_no(&self) -> u64 {
        self.last.tx_no
    }
}

struct TrackerRun {
    ledger: Arc<dyn LedgerClient>,
    context: Arc<dyn ContextProvider>,
    nonce_index: NonceIndexReader,
    config: TrackerConfig,
    emitter: Emitter,
}

impl TrackerRun {
    async fn drive<F>(mut self, call: F)
    where
        F: Future<Output = Result<String, SignerError>> + Send,
    {
        let tx_no = self.emitter.tx_no();

        let tx_hash = match call.await {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                if !e.is_user_denied() {
                    error!(tx_no, error = %e, "transaction failed before broadcast");
                }
                self.emitter
                    .emit(TxStage::CancelledByTheUser { error: e.to_string() });
                return;
            }
        };

        let broadcasted_at = Utc::now();
        info!(tx_no, tx_hash = %tx_hash, "transaction broadcast");
        self.emitter.emit(TxStage::Propagating {
            tx_hash: tx_hash.clone(),
            broadcasted_at,
        });

        // misses keep the Propagating snapshot emitted at broadcast
        let found = wait_for_mempool(
            self.ledger.as_ref(),
            &tx_hash,
            self.config.mempool_poll_interval,
        )
        .await;

        let index_reader = self.nonce_index.clone();
        let resolution = resolve(&found, &nonce_index::latest(&index_reader));
        if let Some(kind) = resolution.rebroadcast {
            info!(
                tx_no,
                original_hash = %found.hash,
                replacement_hash = %resolution.tx_hash,
                rebroadcast = ?kind,
                "transaction was replaced externally"
            );
        }
        self.emitter.emit(TxStage::WaitingForConfirmation {
            tx_hash: resolution.tx_hash,
            broadcasted_at,
        });

        let mut blocks = BlockTicks::new(self.context.subscribe_blocks());
        let mined = wait_for_receipt(self.ledger.as_ref(), &mut blocks, || {
            resolve(&found, &nonce_index::latest(&index_reader))
        })
        .await;

        let mined = match mined {
            Ok(mined) => mined,
            Err(e) => {
                warn!(tx_no, error = %e, "receipt pipeline failed");
                self.emitter.emit(TxStage::Error {
                    tx_hash: e.tx_hash().to_string(),
                    error: e.to_string(),
                });
                return;
            }
        };

        let tx_hash = mined.receipt.transaction_hash.clone();
        if !mined.receipt.is_success() {
            warn!(
                tx_no,
                tx_hash = %tx_hash,
                block = mined.block_number,
                "transaction reverted on chain"
            );
            self.emitter.emit(TxStage::Failure {
                tx_hash,
                block_number: mined.block_number,
                receipt: mined.receipt,
            });
            return;
        }

        let safe_confirmations = self.context.current().safe_confirmations;
        info!(
            tx_no,
            tx_hash = %tx_hash,
            block = mined.block_number,
            safe_confirmations,
            "transaction mined"
        );

        // a fresh subscription replays the current head first
        let mut blocks = BlockTicks::new(self.context.subscribe_blocks());
        let mut accrued: u64 = 0;
        while let Some(head) = blocks.next().await {
            accrued = accrued.max(confirmations(head, mined.block_number));
            self.emitter.emit(TxStage::Success {
                tx_hash: tx_hash.clone(),
                block_number: mined.block_number,
                receipt: mined.receipt.clone(),
                confirmations: accrued,
                safe_confirmations,
                rebroadcast: mined.resolution.rebroadcast,
            });
            if accrued >= safe_confirmations {
                info!(tx_no, tx_hash = %tx_hash, confirmations = accrued, "transaction is final");
                return;
            }
        }
        warn!(tx_no, tx_hash = %tx_hash, "block feed closed before transaction became final");
    }
}
