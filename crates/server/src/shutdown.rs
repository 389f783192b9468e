//! Graceful shutdown handling.
//!
//! Provides signal handling for clean server shutdown.

use tokio::signal;

/// Waits for a shutdown signal (Ctrl-C or SIGTERM).
///
/// On Unix systems, also handles SIGTERM for container environments.
#[allow(clippy::expect_used)]
pub async fn shutdown_signal() {
    let ctrl_c = async {
        // If signal handlers cannot be installed the process cannot shut
        // down cleanly; abort early instead of running unstoppable.
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
