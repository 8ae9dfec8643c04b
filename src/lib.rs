//! Client-side transaction lifecycle tracking for an EVM ledger.
//!
//! [`transactions::TransactionTracker`] follows each submitted transaction
//! from wallet approval through propagation and inclusion to a terminal
//! state, detecting replacements made outside the application through the
//! external nonce index kept fresh by [`workers::nonce_index_refresher`].

pub mod chains;
pub mod config;
pub mod logging;
pub mod network;
pub mod transactions;
pub mod workers;
