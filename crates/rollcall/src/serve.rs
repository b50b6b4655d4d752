// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `rollcall serve` and `rollcall reconcile`.

use std::sync::Arc;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use rollcall_config::RollcallConfig;
use rollcall_core::RollcallError;
use rollcall_gateway::GatewayState;
use tracing::{info, warn};

use crate::app::App;
use crate::shutdown::install_signal_handler;

/// Installs the global Prometheus recorder and describes engine metrics.
fn install_metrics() -> Result<PrometheusHandle, RollcallError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| RollcallError::Internal(format!("failed to install Prometheus recorder: {e}")))?;
    rollcall_engine::metrics::register_metrics();
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Runs the gateway and, when enabled, the reconciliation loop until a
/// shutdown signal arrives.
pub async fn run_serve(config: RollcallConfig) -> Result<(), RollcallError> {
    let metrics = install_metrics()?;
    let app = App::open(&config).await?;
    let cancel = install_signal_handler();

    let reconcile_task = if config.reconcile.enabled {
        let reconciler = app.reconciler.clone();
        let loop_cancel = cancel.clone();
        Some(tokio::spawn(async move { reconciler.run(loop_cancel).await }))
    } else {
        info!("reconciliation loop disabled");
        None
    };

    let state = GatewayState::new(
        app.sessions.clone(),
        app.recorder.clone(),
        app.dyn_store(),
        app.ledger.clone(),
    )
    .with_prometheus(Arc::new(move || metrics.render()));

    info!(name = %config.service.name, "rollcall serving");
    let served = rollcall_gateway::start_server(&config.gateway, state, cancel.clone()).await;
    // A bind failure must stop the background loop too.
    cancel.cancel();

    if let Some(task) = reconcile_task {
        if let Err(e) = task.await {
            warn!(error = %e, "reconciliation task ended abnormally");
        }
    }
    app.close().await?;
    info!("shutdown complete");
    served
}

/// Runs one reconciliation pass, or keeps running passes with `watch`.
pub async fn run_reconcile(config: RollcallConfig, watch: bool) -> Result<(), RollcallError> {
    let app = App::open(&config).await?;
    let result = if watch {
        app.reconciler.run(install_signal_handler()).await;
        Ok(())
    } else {
        app.reconciler.reconcile_once().await.map(|report| {
            println!(
                "imported {}  promoted {}  rejected {}  resubmitted {}  conflicts {}  pinned {}",
                report.imported,
                report.promoted,
                report.rejected,
                report.resubmitted,
                report.conflicts,
                report.pinned
            );
        })
    };
    app.close().await?;
    result
}
