//! Shutdown signal helpers.

use tokio::sync::watch;

/// Resolves once the shutdown flag is set or its sender is gone.
///
/// Race it against a long-running step with `tokio::select!` so the step
/// is abandoned on shutdown.
pub async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}
