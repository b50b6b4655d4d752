// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal handling for graceful shutdown.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cancels the returned token on the first SIGINT or SIGTERM. The gateway
/// and the reconciliation loop both stop on it.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!(signal = "SIGINT", "stopping rollcall"),
                        _ = sigterm.recv() => info!(signal = "SIGTERM", "stopping rollcall"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "cannot listen for SIGTERM; only Ctrl+C stops rollcall");
                    let _ = ctrl_c.await;
                    info!(signal = "SIGINT", "stopping rollcall");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!(signal = "ctrl-c", "stopping rollcall");
        }

        trigger.cancel();
        debug!("shutdown token cancelled");
    });

    token
}
