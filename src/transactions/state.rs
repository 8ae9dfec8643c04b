//! Transaction state snapshots
//!
//! A [`TxState`] is one step of a tracked transaction: the fields shared by
//! every step plus a [`TxStage`] carrying the status-specific data.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::chains::traits::TransactionReceipt;

/// Status tag of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    WaitingForApproval,
    CancelledByTheUser,
    Propagating,
    WaitingForConfirmation,
    Success,
    Error,
    Failure,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::WaitingForApproval => "WaitingForApproval",
            TxStatus::CancelledByTheUser => "CancelledByTheUser",
            TxStatus::Propagating => "Propagating",
            TxStatus::WaitingForConfirmation => "WaitingForConfirmation",
            TxStatus::Success => "Success",
            TxStatus::Error => "Error",
            TxStatus::Failure => "Failure",
        }
    }

    /// Terminal statuses never transition to another status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxStatus::CancelledByTheUser | TxStatus::Error | TxStatus::Failure | TxStatus::Success
        )
    }

    /// Position in the state machine; a tracker never moves to a lower rank.
    pub fn rank(&self) -> u8 {
        match self {
            TxStatus::WaitingForApproval => 0,
            TxStatus::Propagating => 1,
            TxStatus::WaitingForConfirmation => 2,
            TxStatus::CancelledByTheUser
            | TxStatus::Success
            | TxStatus::Error
            | TxStatus::Failure => 3,
        }
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an externally observed replacement relates to the original transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebroadcastKind {
    /// Same payload resent, usually with a higher fee
    Speedup,
    /// Different payload under the same nonce, voiding the original
    Cancel,
}

/// Status-specific part of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum TxStage {
    WaitingForApproval,
    CancelledByTheUser {
        error: String,
    },
    Propagating {
        tx_hash: String,
        broadcasted_at: DateTime<Utc>,
    },
    WaitingForConfirmation {
        tx_hash: String,
        broadcasted_at: DateTime<Utc>,
    },
    Success {
        tx_hash: String,
        block_number: u64,
        receipt: TransactionReceipt,
        confirmations: u64,
        safe_confirmations: u64,
        rebroadcast: Option<RebroadcastKind>,
    },
    Failure {
        tx_hash: String,
        block_number: u64,
        receipt: TransactionReceipt,
    },
    Error {
        tx_hash: String,
        error: String,
    },
}

impl TxStage {
    pub fn status(&self) -> TxStatus {
        match self {
            TxStage::WaitingForApproval => TxStatus::WaitingForApproval,
            TxStage::CancelledByTheUser { .. } => TxStatus::CancelledByTheUser,
            TxStage::Propagating { .. } => TxStatus::Propagating,
            TxStage::WaitingForConfirmation { .. } => TxStatus::WaitingForConfirmation,
            TxStage::Success { .. } => TxStatus::Success,
            TxStage::Failure { .. } => TxStatus::Failure,
            TxStage::Error { .. } => TxStatus::Error,
        }
    }
}

/// One snapshot of a tracked transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxState {
    pub account: String,
    pub tx_no: u64,
    pub network_id: String,
    /// Caller supplied metadata, opaque to the tracker
    pub meta: JsonValue,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub last_change: DateTime<Utc>,
    /// Hidden by the user; independent of the status
    pub dismissed: bool,
    #[serde(flatten)]
    pub stage: TxStage,
}

impl TxState {
    /// First snapshot of a freshly submitted transaction
    pub fn waiting_for_approval(
        account: impl Into<String>,
        network_id: impl Into<String>,
        tx_no: u64,
        meta: JsonValue,
    ) -> Self {
        let now = Utc::now();
        Self {
            account: account.into(),
            tx_no,
            network_id: network_id.into(),
            meta,
            start: now,
            end: None,
            last_change: now,
            dismissed: false,
            stage: TxStage::WaitingForApproval,
        }
    }

    pub fn status(&self) -> TxStatus {
        self.stage.status()
    }

    /// Next snapshot: same common fields, new stage, a later `last_change`.
    ///
    /// Terminal stages also stamp `end` unless it is already set.
    pub fn advance(&self, stage: TxStage) -> Self {
        let last_change = later_than(self.last_change);
        let end = match self.end {
            Some(end) => Some(end),
            None if stage.status().is_terminal() => Some(last_change),
            None => None,
        };
        Self {
            end,
            last_change,
            stage,
            ..self.clone()
        }
    }
}

/// Current time, nudged forward so it is strictly after `previous`.
fn later_than(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

pub fn is_done(state: &TxState) -> bool {
    state.status().is_terminal()
}

pub fn is_success(state: &TxState) -> bool {
    state.status() == TxStatus::Success
}

/// On-chain hash of a snapshot.
///
/// Only statuses that refer to a transaction seen on chain carry one;
/// `Propagating` has a broadcast hash but it is not visible by lookup yet.
pub fn get_tx_hash(state: &TxState) -> Option<&str> {
    match &state.stage {
        TxStage::WaitingForConfirmation { tx_hash, .. }
        | TxStage::Success { tx_hash, .. }
        | TxStage::Failure { tx_hash, .. }
        | TxStage::Error { tx_hash, .. } => Some(tx_hash),
        TxStage::WaitingForApproval
        | TxStage::CancelledByTheUser { .. }
        | TxStage::Propagating { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn receipt() -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: "0xh".to_string(),
            status: "0x1".to_string(),
            block_number: Some(100),
        }
    }

    fn all_stages() -> Vec<TxStage> {
        let now = Utc::now();
        vec![
            TxStage::WaitingForApproval,
            TxStage::CancelledByTheUser {
                error: "denied".to_string(),
            },
            TxStage::Propagating {
                tx_hash: "0xh".to_string(),
                broadcasted_at: now,
            },
            TxStage::WaitingForConfirmation {
                tx_hash: "0xh".to_string(),
                broadcasted_at: now,
            },
            TxStage::Success {
                tx_hash: "0xh".to_string(),
                block_number: 100,
                receipt: receipt(),
                confirmations: 0,
                safe_confirmations: 12,
                rebroadcast: None,
            },
            TxStage::Failure {
                tx_hash: "0xh".to_string(),
                block_number: 100,
                receipt: receipt(),
            },
            TxStage::Error {
                tx_hash: "0xh".to_string(),
                error: "boom".to_string(),
            },
        ]
    }

    #[test]
    fn test_tx_hash_defined_for_on_chain_statuses_only() {
        let base = TxState::waiting_for_approval("0xacc", "1", 1, json!({}));
        for stage in all_stages() {
            let state = base.advance(stage);
            let expected = matches!(
                state.status(),
                TxStatus::WaitingForConfirmation
                    | TxStatus::Success
                    | TxStatus::Failure
                    | TxStatus::Error
            );
            assert_eq!(
                get_tx_hash(&state).is_some(),
                expected,
                "status {}",
                state.status()
            );
        }
    }

    #[test]
    fn test_done_statuses() {
        let base = TxState::waiting_for_approval("0xacc", "1", 1, json!({}));
        assert!(!is_done(&base));
        let done: Vec<TxStatus> = all_stages()
            .into_iter()
            .map(|stage| base.advance(stage))
            .filter(is_done)
            .map(|s| s.status())
            .collect();
        assert_eq!(
            done,
            vec![
                TxStatus::CancelledByTheUser,
                TxStatus::Success,
                TxStatus::Failure,
                TxStatus::Error
            ]
        );
    }

    #[test]
    fn test_advance_moves_last_change_forward_and_stamps_end() {
        let first = TxState::waiting_for_approval("0xacc", "1", 7, json!({"kind": "approve"}));
        let propagating = first.advance(TxStage::Propagating {
            tx_hash: "0xh".to_string(),
            broadcasted_at: Utc::now(),
        });
        assert!(propagating.last_change > first.last_change);
        assert!(propagating.end.is_none());
        assert_eq!(propagating.tx_no, 7);
        assert_eq!(propagating.meta, json!({"kind": "approve"}));

        let failed = propagating.advance(TxStage::Error {
            tx_hash: "0xh".to_string(),
            error: "boom".to_string(),
        });
        assert!(failed.last_change > propagating.last_change);
        assert_eq!(failed.end, Some(failed.last_change));
    }

    #[test]
    fn test_advance_keeps_existing_end() {
        let first = TxState::waiting_for_approval("0xacc", "1", 1, json!(null));
        let success = first.advance(all_stages()[4].clone());
        let end = success.end;
        let more = success.advance(all_stages()[4].clone());
        assert_eq!(more.end, end);
        assert!(is_success(&more));
    }

    #[test]
    fn test_serialized_state_is_tagged_by_status() {
        let state = TxState::waiting_for_approval("0xacc", "1", 3, json!({}));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["status"], json!("WaitingForApproval"));
        assert_eq!(value["tx_no"], json!(3));
        assert_eq!(value["dismissed"], json!(false));
    }
}
