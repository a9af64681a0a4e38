//! Provides a shutdown signal to abort an action in flight.
//!
//! See: [`signal`]

use tokio::signal;
use tracing::{error, info};

/// Resolves once the process receives Ctrl + C.
///
/// If the handler cannot be installed the error is logged and the future never resolves, so the action runs to
/// its own end.
pub async fn signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl + C, shutting down…"),
        Err(err) => {
            error!("failed to install Ctrl + C signal handler: {err}");
            std::future::pending::<()>().await;
        }
    }
}
