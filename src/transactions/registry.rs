//! Transaction registry
//!
//! Process-wide store of every tracked transaction, one entry per `tx_no` in
//! first-seen order. All writes go through the single watch channel that
//! holds the store, so concurrent trackers never race on it.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::network::ContextProvider;
use crate::transactions::state::TxState;

/// Registry failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no tracked transaction with tx_no {0}")]
    UnknownTransaction(u64),
}

/// Live, filtered list of transactions for the active account and network
pub type TransactionsView = watch::Receiver<Vec<TxState>>;

/// Cloneable handle to the shared store
#[derive(Debug, Clone)]
pub struct TransactionRegistry {
    store: Arc<watch::Sender<Vec<TxState>>>,
}

impl Default for TransactionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionRegistry {
    pub fn new() -> Self {
        let (store, _) = watch::channel(Vec::new());
        Self {
            store: Arc::new(store),
        }
    }

    /// Replace the entry with the same `tx_no`, or append a new one.
    ///
    /// A dismissed entry stays dismissed when a newer snapshot arrives.
    pub fn upsert(&self, state: TxState) {
        self.store.send_modify(|transactions| {
            match transactions.iter_mut().find(|t| t.tx_no == state.tx_no) {
                Some(existing) => {
                    let dismissed = existing.dismissed || state.dismissed;
                    *existing = state;
                    existing.dismissed = dismissed;
                }
                None => transactions.push(state),
            }
        });
    }

    /// Hide a transaction from the user without removing it.
    pub fn dismiss(&self, tx_no: u64) -> Result<(), RegistryError> {
        let mut found = false;
        self.store.send_if_modified(|transactions| {
            match transactions.iter_mut().find(|t| t.tx_no == tx_no) {
                Some(existing) => {
                    found = true;
                    let changed = !existing.dismissed;
                    existing.dismissed = true;
                    changed
                }
                None => false,
            }
        });

        if found {
            debug!(tx_no, "transaction dismissed");
            Ok(())
        } else {
            warn!(tx_no, "dismiss requested for unknown transaction");
            Err(RegistryError::UnknownTransaction(tx_no))
        }
    }

    /// Every tracked transaction, in first-seen order.
    pub fn all(&self) -> Vec<TxState> {
        self.store.borrow().clone()
    }

    pub fn get(&self, tx_no: u64) -> Option<TxState> {
        self.store.borrow().iter().find(|t| t.tx_no == tx_no).cloned()
    }

    /// Current entries for one account on one network.
    pub fn snapshot_for(&self, account: &str, network_id: &str) -> Vec<TxState> {
        filter_for(&self.store.borrow(), Some(account), network_id)
    }

    /// Live view for whatever account and network `context` reports.
    ///
    /// The view starts empty and is recomputed whenever the store, the active
    /// account or the active network changes. The projection task ends once
    /// every receiver has been dropped.
    pub fn view(&self, context: Arc<dyn ContextProvider>) -> TransactionsView {
        let (view_tx, view_rx) = watch::channel(Vec::new());
        let mut store = self.store.subscribe();
        let mut account = context.subscribe_account();
        let mut network = context.subscribe_context();

        tokio::spawn(async move {
            loop {
                let projected = {
                    let transactions = store.borrow_and_update();
                    let account = account.borrow_and_update();
                    let network = network.borrow_and_update();
                    filter_for(&transactions, account.as_deref(), &network.network_id)
                };
                view_tx.send_if_modified(|current| {
                    if *current == projected {
                        return false;
                    }
                    *current = projected;
                    true
                });

                tokio::select! {
                    changed = store.changed() => if changed.is_err() { break },
                    changed = account.changed() => if changed.is_err() { break },
                    changed = network.changed() => if changed.is_err() { break },
                    _ = view_tx.closed() => break,
                }
            }
            debug!("transactions view closed");
        });

        view_rx
    }
}

/// Entries whose account and network both match exactly.
pub fn filter_for(transactions: &[TxState], account: Option<&str>, network_id: &str) -> Vec<TxState> {
    let Some(account) = account else {
        return Vec::new();
    };
    transactions
        .iter()
        .filter(|t| t.account == account && t.network_id == network_id)
        .cloned()
        .collect()
}
