use tokio::sync::watch;

pub mod block_watcher;
pub mod nonce_index_refresher;

/// Resolve once shutdown is signalled.
///
/// A dropped sender can never signal, so the future then stays pending
/// instead of resolving on every poll.
pub async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    if shutdown_rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
