//! Network and account context
//!
//! The tracker, the nonce index refresher and the registry view all read the
//! active network, the active account and the chain head from a
//! [`ContextProvider`]. [`ChainContext`] is the in-process implementation: the
//! binary pushes block heights into it from the block watcher, tests push them
//! by hand.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Per-network settings the tracker needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkContext {
    /// Network identifier, e.g. "1" for mainnet
    pub network_id: String,
    /// Blocks on top of inclusion before a success is considered final
    pub safe_confirmations: u64,
    /// History service endpoint for this network
    pub history_api_url: String,
    /// History service API key
    pub history_api_key: Option<String>,
}

/// Source of the active network, account and chain head
pub trait ContextProvider: Send + Sync {
    /// Currently active network settings
    fn current(&self) -> NetworkContext;

    /// Currently active account, if one is connected
    fn current_account(&self) -> Option<String>;

    /// Live network settings
    fn subscribe_context(&self) -> watch::Receiver<NetworkContext>;

    /// Live active account
    fn subscribe_account(&self) -> watch::Receiver<Option<String>>;

    /// Live chain head; `None` until the first block height is known
    fn subscribe_blocks(&self) -> watch::Receiver<Option<u64>>;
}

/// Watch-backed [`ContextProvider`]
#[derive(Debug)]
pub struct ChainContext {
    context: watch::Sender<NetworkContext>,
    account: watch::Sender<Option<String>>,
    block: watch::Sender<Option<u64>>,
}

impl ChainContext {
    pub fn new(context: NetworkContext, account: Option<String>) -> Self {
        let (context, _) = watch::channel(context);
        let (account, _) = watch::channel(account);
        let (block, _) = watch::channel(None);
        Self {
            context,
            account,
            block,
        }
    }

    /// Record a new chain head. Heights equal to the current one are ignored.
    pub fn set_block(&self, height: u64) {
        let changed = self.block.send_if_modified(|current| {
            if *current == Some(height) {
                return false;
            }
            *current = Some(height);
            true
        });
        if changed {
            debug!(block = height, "new block");
        }
    }

    pub fn set_account(&self, account: Option<String>) {
        self.account.send_if_modified(|current| {
            if *current == account {
                return false;
            }
            *current = account;
            true
        });
    }

    pub fn set_context(&self, context: NetworkContext) {
        self.context.send_if_modified(|current| {
            if *current == context {
                return false;
            }
            *current = context;
            true
        });
    }

    pub fn current_block(&self) -> Option<u64> {
        *self.block.borrow()
    }
}

impl ContextProvider for ChainContext {
    fn current(&self) -> NetworkContext {
        self.context.borrow().clone()
    }

    fn current_account(&self) -> Option<String> {
        self.account.borrow().clone()
    }

    fn subscribe_context(&self) -> watch::Receiver<NetworkContext> {
        self.context.subscribe()
    }

    fn subscribe_account(&self) -> watch::Receiver<Option<String>> {
        self.account.subscribe()
    }

    fn subscribe_blocks(&self) -> watch::Receiver<Option<u64>> {
        self.block.subscribe()
    }
}

/// Every-new-block sequence over a block subscription.
///
/// The first call yields the current height if one is already known; later
/// calls wait for the head to move. Yields `None` once the provider is gone.
#[derive(Debug)]
pub struct BlockTicks {
    blocks: watch::Receiver<Option<u64>>,
    primed: bool,
}

impl BlockTicks {
    pub fn new(blocks: watch::Receiver<Option<u64>>) -> Self {
        Self {
            blocks,
            primed: false,
        }
    }

    pub async fn next(&mut self) -> Option<u64> {
        if !self.primed {
            self.primed = true;
            if let Some(height) = *self.blocks.borrow_and_update() {
                return Some(height);
            }
        }
        loop {
            self.blocks.changed().await.ok()?;
            if let Some(height) = *self.blocks.borrow_and_update() {
                return Some(height);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mainnet() -> NetworkContext {
        NetworkContext {
            network_id: "1".to_string(),
            safe_confirmations: 12,
            history_api_url: "https://api.etherscan.io/api".to_string(),
            history_api_key: None,
        }
    }

    #[test]
    fn test_set_block_ignores_repeated_height() {
        let ctx = ChainContext::new(mainnet(), None);
        let mut blocks = ctx.subscribe_blocks();
        assert_eq!(*blocks.borrow_and_update(), None);

        ctx.set_block(5);
        assert!(blocks.has_changed().unwrap());
        assert_eq!(*blocks.borrow_and_update(), Some(5));

        ctx.set_block(5);
        assert!(!blocks.has_changed().unwrap());
        assert_eq!(ctx.current_block(), Some(5));
    }

    #[test]
    fn test_account_and_context_updates() {
        let ctx = ChainContext::new(mainnet(), Some("0xaaa".to_string()));
        assert_eq!(ctx.current_account().as_deref(), Some("0xaaa"));

        ctx.set_account(Some("0xbbb".to_string()));
        assert_eq!(ctx.current_account().as_deref(), Some("0xbbb"));

        let mut kovan = mainnet();
        kovan.network_id = "42".to_string();
        ctx.set_context(kovan);
        assert_eq!(ctx.current().network_id, "42");
    }

    #[tokio::test]
    async fn test_block_ticks_replay_current_then_wait() {
        let ctx = ChainContext::new(mainnet(), None);
        ctx.set_block(7);
        let mut ticks = BlockTicks::new(ctx.subscribe_blocks());
        assert_eq!(ticks.next().await, Some(7));

        ctx.set_block(8);
        assert_eq!(ticks.next().await, Some(8));

        drop(ctx);
        assert_eq!(ticks.next().await, None);
    }
}
