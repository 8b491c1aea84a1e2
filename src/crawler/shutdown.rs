//! Termination signal handling
//!
//! The first SIGINT or SIGTERM cancels the crawl's token; later signals are
//! logged and otherwise ignored so cleanup is never interrupted.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Spawns a task that cancels `cancel` on the first termination signal
///
/// The returned handle should be aborted once the crawl has finished.
pub fn listen_for_shutdown(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut received = 0u32;
        loop {
            let signal = match wait_for_signal().await {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("Failed to listen for shutdown signals: {}", e);
                    return;
                }
            };

            received += 1;
            if received == 1 {
                info!("Received {} - initiating graceful shutdown...", signal);
                cancel.cancel();
            } else {
                info!("Received {} again, shutdown already in progress", signal);
            }
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "Ctrl-C")
}
