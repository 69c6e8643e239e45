//! HTTP server for Prometheus metrics and bridge introspection
//!
//! # Endpoints
//!
//! - `GET /metrics` - Prometheus metrics
//! - `GET /health` - Bridge state summary (JSON)
//! - `GET /bridges` - Most recent aggregate result (JSON)
//!
//! # Example
//!
//! ```ignore
//! use majakka_discovery::metrics_server::MetricsServer;
//!
//! let report = coordinator.last_report();
//! let metrics_handle = MetricsServer::start(config.metrics_addr, Some(report));
//! ```

use crate::coordinator::SharedReport;
use crate::metrics::{BridgeStateCounts, Metrics};
use axum::extract::State;
use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared state for the metrics server
#[derive(Clone)]
struct AppState {
    report: Option<SharedReport>,
}

/// Metrics HTTP server
pub struct MetricsServer;

impl MetricsServer {
    /// Start the metrics server on the given address
    ///
    /// Returns a JoinHandle that can be used to abort the server.
    /// The server runs until aborted or the process exits.
    pub fn start(addr: SocketAddr, report: Option<SharedReport>) -> JoinHandle<()> {
        let state = AppState { report };

        tokio::spawn(async move {
            let app = router(state);

            info!(%addr, "Metrics server starting");

            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    error!(error = %e, %addr, "Failed to bind metrics server");
                    return;
                }
            };

            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "Metrics server error");
            }
        })
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/bridges", get(bridges_handler))
        .with_state(state)
}

/// Handler for /metrics endpoint
async fn metrics_handler() -> impl IntoResponse {
    let body = crate::metrics::gather();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Bridge health summary
#[derive(Serialize)]
struct HealthSummary {
    status: &'static str,
    bridges: BridgeStateCounts,
    records_published: f64,
}

/// Handler for /health endpoint
///
/// `degraded` while any bridge is failed; still 200 so the process isn't
/// restarted over one bad backend.
async fn health_handler() -> impl IntoResponse {
    let Some(metrics) = Metrics::get() else {
        return (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response();
    };

    let bridges = metrics.bridge_state_counts();
    let status = if bridges.failed > 0 {
        "degraded"
    } else {
        "healthy"
    };

    let summary = HealthSummary {
        status,
        bridges,
        records_published: metrics.records_published_total(),
    };

    (StatusCode::OK, Json(summary)).into_response()
}

/// Handler for /bridges endpoint - returns the last aggregate result as JSON
async fn bridges_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.report.as_ref().and_then(|report| report.read().clone());
    match snapshot {
        Some(report) => (StatusCode::OK, Json(report)).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "No lifecycle report available").into_response(),
    }
}
