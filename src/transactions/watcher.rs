//! Confirmation watcher
//!
//! Two polling loops used by the tracker: one waits for a broadcast hash to
//! become visible through lookup-by-hash, the other waits, block by block, for
//! a receipt that has been assigned a block number.

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::chains::traits::{LedgerClient, LedgerError, LedgerTransaction, TransactionReceipt};
use crate::network::BlockTicks;
use crate::transactions::replacement::Resolution;

/// Failures of the receipt pipeline, tagged with the hash being followed
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("receipt lookup for {tx_hash} failed: {source}")]
    Ledger {
        tx_hash: String,
        #[source]
        source: LedgerError,
    },

    #[error("block feed closed while waiting for receipt of {tx_hash}")]
    BlockFeedClosed { tx_hash: String },
}

impl WatchError {
    /// Last hash the pipeline was following when it failed.
    pub fn tx_hash(&self) -> &str {
        match self {
            WatchError::Ledger { tx_hash, .. } | WatchError::BlockFeedClosed { tx_hash } => {
                tx_hash
            }
        }
    }
}

/// A receipt that has been assigned to a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinedReceipt {
    pub receipt: TransactionReceipt,
    pub block_number: u64,
    pub resolution: Resolution,
}

/// Poll lookup-by-hash until the transaction becomes visible.
///
/// The first poll happens immediately, then every `poll_interval`. Repeated
/// identical results are ignored. The poll that finds the transaction ends
/// the loop and its result is returned. Lookup errors are logged and polling
/// goes on.
pub async fn wait_for_mempool(
    ledger: &dyn LedgerClient,
    tx_hash: &str,
    poll_interval: Duration,
) -> LedgerTransaction {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen: Option<Option<LedgerTransaction>> = None;

    loop {
        ticker.tick().await;

        let result = match ledger.get_transaction(tx_hash).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tx_hash = %tx_hash, error = %e, "mempool lookup failed; will retry");
                continue;
            }
        };

        if last_seen.as_ref() == Some(&result) {
            continue;
        }
        last_seen = Some(result.clone());

        match result {
            Some(transaction) => return transaction,
            None => debug!(tx_hash = %tx_hash, "transaction not found in mempool yet"),
        }
    }
}

/// Wait for a mined receipt, checking once per block.
///
/// `resolve` is re-evaluated on every block so that a replacement appearing
/// in the nonce index later is still followed. Receipts without a block
/// number are skipped. Any ledger error ends the wait.
pub async fn wait_for_receipt<F>(
    ledger: &dyn LedgerClient,
    blocks: &mut BlockTicks,
    mut resolve: F,
) -> Result<MinedReceipt, WatchError>
where
    F: FnMut() -> Resolution + Send,
{
    let mut resolution = resolve();

    loop {
        if blocks.next().await.is_none() {
            return Err(WatchError::BlockFeedClosed {
                tx_hash: resolution.tx_hash,
            });
        }
        resolution = resolve();

        let receipt = ledger
            .get_transaction_receipt(&resolution.tx_hash)
            .await
            .map_err(|source| WatchError::Ledger {
                tx_hash: resolution.tx_hash.clone(),
                source,
            })?;

        if let Some(receipt) = receipt {
            if let Some(block_number) = receipt.block_number {
                return Ok(MinedReceipt {
                    receipt,
                    block_number,
                    resolution,
                });
            }
        }
    }
}

/// Blocks built on top of the one a receipt was included in.
pub fn confirmations(current_block: u64, receipt_block: u64) -> u64 {
    current_block.saturating_sub(receipt_block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::traits::{LedgerResult, SignerError};
    use crate::network::{ChainContext, ContextProvider, NetworkContext};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedLedger {
        lookups: Mutex<VecDeque<LedgerResult<Option<LedgerTransaction>>>>,
        lookup_calls: Mutex<u32>,
        receipts: Mutex<HashMap<String, LedgerResult<Option<TransactionReceipt>>>>,
    }

    #[async_trait]
    impl LedgerClient for ScriptedLedger {
        async fn get_transaction(&self, _: &str) -> LedgerResult<Option<LedgerTransaction>> {
            *self.lookup_calls.lock().unwrap() += 1;
            self.lookups.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }

        async fn get_transaction_receipt(
            &self,
            tx_hash: &str,
        ) -> LedgerResult<Option<TransactionReceipt>> {
            self.receipts
                .lock()
                .unwrap()
                .get(tx_hash)
                .cloned()
                .unwrap_or(Ok(None))
        }

        async fn block_number(&self) -> LedgerResult<u64> {
            Ok(0)
        }

        async fn send_raw_transaction(&self, _: &str) -> Result<String, SignerError> {
            Err(SignerError::broadcast_failed("not supported"))
        }
    }

    fn found(hash: &str) -> LedgerTransaction {
        LedgerTransaction {
            hash: hash.to_string(),
            nonce: 1,
            input: "0x".to_string(),
            block_number: None,
        }
    }

    fn context() -> ChainContext {
        ChainContext::new(
            NetworkContext {
                network_id: "1".to_string(),
                safe_confirmations: 2,
                history_api_url: "http://localhost".to_string(),
                history_api_key: None,
            },
            None,
        )
    }

    fn follow(hash: &str) -> Resolution {
        Resolution {
            tx_hash: hash.to_string(),
            rebroadcast: None,
        }
    }

    #[test]
    fn test_confirmations_never_negative() {
        assert_eq!(confirmations(110, 100), 10);
        assert_eq!(confirmations(100, 100), 0);
        assert_eq!(confirmations(90, 100), 0);
    }

    #[tokio::test]
    async fn test_mempool_wait_retries_until_visible() {
        let ledger = ScriptedLedger::default();
        {
            let mut lookups = ledger.lookups.lock().unwrap();
            lookups.push_back(Ok(None));
            lookups.push_back(Ok(None));
            lookups.push_back(Err(LedgerError::Timeout { seconds: 1 }));
            lookups.push_back(Ok(None));
            lookups.push_back(Ok(Some(found("0xabc"))));
        }

        let tx = wait_for_mempool(&ledger, "0xabc", Duration::from_millis(5)).await;

        assert_eq!(tx.hash, "0xabc");
        assert_eq!(*ledger.lookup_calls.lock().unwrap(), 5);
    }

    #[tokio::test]
    async fn test_mempool_wait_returns_on_first_poll_when_visible() {
        let ledger = ScriptedLedger::default();
        ledger
            .lookups
            .lock()
            .unwrap()
            .push_back(Ok(Some(found("0xabc"))));

        let tx = wait_for_mempool(&ledger, "0xabc", Duration::from_secs(60)).await;
        assert_eq!(tx.hash, "0xabc");
        assert_eq!(*ledger.lookup_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_receipt_wait_skips_pending_receipts() {
        let ledger = ScriptedLedger::default();
        ledger.receipts.lock().unwrap().insert(
            "0xabc".to_string(),
            Ok(Some(TransactionReceipt {
                transaction_hash: "0xabc".to_string(),
                status: "0x1".to_string(),
                block_number: None,
            })),
        );
        let ctx = context();
        ctx.set_block(10);
        let mut blocks = BlockTicks::new(ctx.subscribe_blocks());

        let waiter = async { wait_for_receipt(&ledger, &mut blocks, || follow("0xabc")).await };
        let mine = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ledger.receipts.lock().unwrap().insert(
                "0xabc".to_string(),
                Ok(Some(TransactionReceipt {
                    transaction_hash: "0xabc".to_string(),
                    status: "0x1".to_string(),
                    block_number: Some(11),
                })),
            );
            ctx.set_block(11);
        };

        let (mined, _) = tokio::join!(waiter, mine);
        let mined = mined.unwrap();
        assert_eq!(mined.block_number, 11);
        assert_eq!(mined.resolution.tx_hash, "0xabc");
    }

    #[tokio::test]
    async fn test_receipt_wait_reports_ledger_error_with_hash() {
        let ledger = ScriptedLedger::default();
        ledger.receipts.lock().unwrap().insert(
            "0xdef".to_string(),
            Err(LedgerError::NetworkError {
                message: "connection reset".to_string(),
            }),
        );
        let ctx = context();
        ctx.set_block(3);
        let mut blocks = BlockTicks::new(ctx.subscribe_blocks());

        let err = wait_for_receipt(&ledger, &mut blocks, || follow("0xdef"))
            .await
            .unwrap_err();
        assert_eq!(err.tx_hash(), "0xdef");
        assert!(err.to_string().contains("connection reset"));
    }
}
