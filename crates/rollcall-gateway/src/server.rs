// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use rollcall_config::GatewayConfig;
use rollcall_core::{AttendanceStore, RollcallError};
use rollcall_engine::{AttendanceRecorder, SessionManager};
use rollcall_ledger::LedgerClient;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// State for the health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            start_time: std::time::Instant::now(),
            prometheus_render: None,
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub sessions: Arc<SessionManager>,
    pub recorder: Arc<AttendanceRecorder>,
    pub store: Arc<dyn AttendanceStore>,
    pub ledger: LedgerClient,
    pub health: HealthState,
}

impl GatewayState {
    pub fn new(
        sessions: Arc<SessionManager>,
        recorder: Arc<AttendanceRecorder>,
        store: Arc<dyn AttendanceStore>,
        ledger: LedgerClient,
    ) -> Self {
        Self {
            sessions,
            recorder,
            store,
            ledger,
            health: HealthState::default(),
        }
    }

    pub fn with_prometheus(mut self, render: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        self.health.prometheus_render = Some(render);
        self
    }
}

/// Builds the gateway router:
/// - POST /v1/sessions, GET /v1/sessions
/// - GET /v1/sessions/{code}
/// - POST /v1/attendance, GET /v1/attendance
/// - GET /health, GET /metrics
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route(
            "/v1/sessions",
            post(handlers::post_session).get(handlers::get_sessions),
        )
        .route("/v1/sessions/{code}", get(handlers::get_session))
        .route(
            "/v1/attendance",
            post(handlers::post_attendance).get(handlers::get_attendance),
        )
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds to the configured host:port and serves until `cancel` fires.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), RollcallError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RollcallError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| RollcallError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
