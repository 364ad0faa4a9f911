//! Waits for `SIGTERM`/`SIGINT` (spec §5). Grounded on the same
//! `tokio::signal::unix` race used elsewhere in the workspace for the same
//! purpose.

use tokio::signal::unix::{signal, SignalKind};

/// Resolves on the first `SIGTERM` or `SIGINT`, whichever arrives first.
pub async fn wait_for_signal() {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        _ = sigint.recv() => tracing::info!("received SIGINT"),
    }
}
