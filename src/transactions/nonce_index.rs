//! External nonce index
//!
//! Maps sender nonces to the transactions the history service has seen for
//! the active account. The index is rebuilt from scratch on every refresh and
//! published as an immutable snapshot; see
//! [`crate::workers::nonce_index_refresher`] for the refresh task.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::chains::traits::HistoricalTransaction;

/// Hash and call data recorded for one nonce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTx {
    pub hash: String,
    pub call_data: String,
}

/// Snapshot of nonce → externally observed transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalNonceIndex {
    entries: HashMap<u64, ExternalTx>,
}

impl ExternalNonceIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an index from history records.
    ///
    /// Records are folded in the order given; when a nonce repeats, the later
    /// record replaces the earlier one.
    pub fn from_history<I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = HistoricalTransaction>,
    {
        let entries = transactions
            .into_iter()
            .map(|tx| {
                (
                    tx.nonce,
                    ExternalTx {
                        hash: tx.hash,
                        call_data: tx.call_data,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, nonce: u64) -> Option<&ExternalTx> {
        self.entries.get(&nonce)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read side of the published index. Cloning is cheap.
pub type NonceIndexReader = watch::Receiver<Arc<ExternalNonceIndex>>;

/// Publishing side of the index, owned by the refresh task.
#[derive(Debug)]
pub struct NonceIndexPublisher {
    tx: watch::Sender<Arc<ExternalNonceIndex>>,
}

impl NonceIndexPublisher {
    /// New publisher holding an empty index.
    pub fn new() -> (Self, NonceIndexReader) {
        let (tx, rx) = watch::channel(Arc::new(ExternalNonceIndex::empty()));
        (Self { tx }, rx)
    }

    /// Replace the published snapshot.
    pub fn publish(&self, index: ExternalNonceIndex) {
        self.tx.send_replace(Arc::new(index));
    }

    pub fn subscribe(&self) -> NonceIndexReader {
        self.tx.subscribe()
    }
}

/// Latest published snapshot; never waits on a refresh in progress.
pub fn latest(reader: &NonceIndexReader) -> Arc<ExternalNonceIndex> {
    reader.borrow().clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str, nonce: u64, call_data: &str) -> HistoricalTransaction {
        HistoricalTransaction {
            hash: hash.to_string(),
            nonce,
            call_data: call_data.to_string(),
        }
    }

    #[test]
    fn test_index_maps_nonce_to_hash_and_call_data() {
        let index = ExternalNonceIndex::from_history(vec![
            record("0x01", 1, "0xaa"),
            record("0x02", 2, "0xbb"),
        ]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(2).map(|e| e.hash.as_str()), Some("0x02"));
        assert_eq!(index.get(1).map(|e| e.call_data.as_str()), Some("0xaa"));
        assert!(index.get(3).is_none());
    }

    #[test]
    fn test_duplicate_nonce_keeps_later_record() {
        let index = ExternalNonceIndex::from_history(vec![
            record("0xnew", 5, "0xaa"),
            record("0xold", 5, "0xbb"),
        ]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(5).map(|e| e.hash.as_str()), Some("0xold"));
    }

    #[test]
    fn test_publish_replaces_snapshot() {
        let (publisher, reader) = NonceIndexPublisher::new();
        assert!(latest(&reader).is_empty());

        let held = latest(&reader);
        publisher.publish(ExternalNonceIndex::from_history(vec![record("0x01", 1, "0x")]));
        assert_eq!(latest(&reader).len(), 1);
        // readers holding an older snapshot keep it unchanged
        assert!(held.is_empty());

        publisher.publish(ExternalNonceIndex::empty());
        assert!(latest(&reader).is_empty());
    }
}
