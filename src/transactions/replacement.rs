//! Replacement detection
//!
//! A transaction found in the mempool may have been replaced by another one
//! sharing its nonce (a wallet "speed up" or "cancel"). The replacement shows
//! up in the external nonce index under the same nonce with a different hash.

use crate::chains::traits::LedgerTransaction;
use crate::transactions::nonce_index::ExternalNonceIndex;
use crate::transactions::state::RebroadcastKind;

/// Hash to follow for receipts, and how it relates to the original
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub tx_hash: String,
    pub rebroadcast: Option<RebroadcastKind>,
}

/// Resolve the canonical hash of `observed` against the nonce index.
///
/// Same call data under a different hash is a speedup, anything else is a
/// cancel. Identical payloads cannot be told apart from a plain resend, so
/// the classification is a heuristic.
pub fn resolve(observed: &LedgerTransaction, index: &ExternalNonceIndex) -> Resolution {
    match index.get(observed.nonce) {
        Some(external) if !same_hex(&external.hash, &observed.hash) => {
            let kind = if same_hex(&external.call_data, &observed.input) {
                RebroadcastKind::Speedup
            } else {
                RebroadcastKind::Cancel
            };
            Resolution {
                tx_hash: external.hash.clone(),
                rebroadcast: Some(kind),
            }
        }
        _ => Resolution {
            tx_hash: observed.hash.clone(),
            rebroadcast: None,
        },
    }
}

fn same_hex(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::traits::HistoricalTransaction;

    fn observed() -> LedgerTransaction {
        LedgerTransaction {
            hash: "0xH".to_string(),
            nonce: 5,
            input: "0xAA".to_string(),
            block_number: None,
        }
    }

    fn index_with(hash: &str, nonce: u64, call_data: &str) -> ExternalNonceIndex {
        ExternalNonceIndex::from_history(vec![HistoricalTransaction {
            hash: hash.to_string(),
            nonce,
            call_data: call_data.to_string(),
        }])
    }

    #[test]
    fn test_no_entry_keeps_observed_hash() {
        let resolution = resolve(&observed(), &ExternalNonceIndex::empty());
        assert_eq!(resolution.tx_hash, "0xH");
        assert_eq!(resolution.rebroadcast, None);

        let resolution = resolve(&observed(), &index_with("0xH2", 6, "0xAA"));
        assert_eq!(resolution.tx_hash, "0xH");
        assert_eq!(resolution.rebroadcast, None);
    }

    #[test]
    fn test_same_call_data_is_speedup() {
        let resolution = resolve(&observed(), &index_with("0xH2", 5, "0xaa"));
        assert_eq!(resolution.tx_hash, "0xH2");
        assert_eq!(resolution.rebroadcast, Some(RebroadcastKind::Speedup));
    }

    #[test]
    fn test_different_call_data_is_cancel() {
        let resolution = resolve(&observed(), &index_with("0xH2", 5, "0x"));
        assert_eq!(resolution.tx_hash, "0xH2");
        assert_eq!(resolution.rebroadcast, Some(RebroadcastKind::Cancel));
    }

    #[test]
    fn test_entry_with_same_hash_is_not_a_replacement() {
        let resolution = resolve(&observed(), &index_with("0xh", 5, "0xAA"));
        assert_eq!(resolution.tx_hash, "0xH");
        assert_eq!(resolution.rebroadcast, None);
    }
}
