//! Transaction lifecycle tracking: state snapshots, the per-transaction
//! tracker, replacement detection and the shared registry.

pub mod nonce_index;
pub mod registry;
pub mod replacement;
pub mod state;
pub mod tracker;
pub mod watcher;

pub use registry::{TransactionRegistry, TransactionsView};
pub use state::{get_tx_hash, is_done, is_success, RebroadcastKind, TxStage, TxState, TxStatus};
pub use tracker::{TrackedTx, TrackerConfig, TransactionTracker};
