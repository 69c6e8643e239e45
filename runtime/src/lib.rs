//! majakka runtime — run a set of discovery bridges as a process
//!
//! Provides [`run()`] for zero-boilerplate startup, and [`RuntimeBuilder`]
//! for users who need control over ports and timeouts.
//!
//! # Quick start
//!
//! ```ignore
//! use majakka_runtime::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     majakka_runtime::run(|mut coordinator| async move {
//!         coordinator.register(Arc::new(StaticBridge::new("static")))?;
//!         Ok(coordinator)
//!     }).await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod prelude;

use majakka_discovery::config::{Config, LogFormat};
use majakka_discovery::metrics::Metrics;
use majakka_discovery::metrics_server::MetricsServer;
use majakka_discovery::{AggregateResult, LifecycleCoordinator};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Run registered bridges with default settings.
///
/// Loads configuration from environment variables, initialises tracing and
/// metrics, calls your closure to register bridges, starts them all, and
/// stops them all again on Ctrl+C or SIGTERM.
///
/// # Example
///
/// ```ignore
/// majakka_runtime::run(|mut coordinator| async move {
///     coordinator.register(Arc::new(
///         StaticBridge::new("static")
///             .with_record(Record::http_endpoint("billing", "billing.internal", 8080, "/")),
///     ))?;
///     Ok(coordinator)
/// }).await
/// ```
pub async fn run<F, Fut>(configure: F) -> anyhow::Result<()>
where
    F: FnOnce(LifecycleCoordinator) -> Fut,
    Fut: Future<Output = anyhow::Result<LifecycleCoordinator>>,
{
    RuntimeBuilder::new().configure(configure).await
}

/// Power-user builder for controlling runtime behaviour.
///
/// Every setting left alone falls back to the environment.
///
/// # Example
///
/// ```ignore
/// RuntimeBuilder::new()
///     .metrics_port(9091)
///     .start_timeout(Some(Duration::from_secs(5)))
///     .configure(|mut coordinator| async move {
///         coordinator.register(Arc::new(StaticBridge::new("static")))?;
///         Ok(coordinator)
///     })
///     .await
/// ```
pub struct RuntimeBuilder {
    metrics_port: Option<u16>,
    metrics_enabled: bool,
    start_timeout: Option<Option<Duration>>,
    stop_timeout: Option<Option<Duration>>,
}

impl RuntimeBuilder {
    /// Create a new builder with defaults from environment variables.
    pub fn new() -> Self {
        Self {
            metrics_port: None,
            metrics_enabled: true,
            start_timeout: None,
            stop_timeout: None,
        }
    }

    /// Override the metrics HTTP server port.
    ///
    /// Default: loaded from `MAJAKKA_METRICS_ADDR` env var, or `9090`.
    pub fn metrics_port(mut self, port: u16) -> Self {
        self.metrics_port = Some(port);
        self
    }

    /// Don't serve `/metrics`, `/health` and `/bridges`.
    pub fn disable_metrics(mut self) -> Self {
        self.metrics_enabled = false;
        self
    }

    /// Override the `start_all` barrier timeout (`None` waits forever).
    ///
    /// Default: `MAJAKKA_START_TIMEOUT_MS`, or 30s.
    pub fn start_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.start_timeout = Some(timeout);
        self
    }

    /// Override the `stop_all` barrier timeout (`None` waits forever).
    ///
    /// Default: `MAJAKKA_STOP_TIMEOUT_MS`, or 10s.
    pub fn stop_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stop_timeout = Some(timeout);
        self
    }

    fn metrics_addr(&self, config: &Config) -> SocketAddr {
        let mut addr = config.metrics_addr;
        if let Some(port) = self.metrics_port {
            addr.set_port(port);
        }
        addr
    }

    /// Register bridges and run them until shutdown.
    ///
    /// This is the terminal method — it blocks until shutdown. Bridge
    /// failures are logged, not returned: a partially started set keeps
    /// serving what it has.
    pub async fn configure<F, Fut>(self, configure: F) -> anyhow::Result<()>
    where
        F: FnOnce(LifecycleCoordinator) -> Fut,
        Fut: Future<Output = anyhow::Result<LifecycleCoordinator>>,
    {
        // ── 1. Load config from env ──────────────────────────────
        let config = Config::from_env()?;
        let start_timeout = self.start_timeout.unwrap_or(config.start_timeout);
        let stop_timeout = self.stop_timeout.unwrap_or(config.stop_timeout);

        // ── 2. Init tracing ──────────────────────────────────────
        init_tracing(&config);

        info!(
            session = %config.session_name,
            metrics_addr = %self.metrics_addr(&config),
            start_timeout_ms = start_timeout.map(|t| t.as_millis() as u64),
            stop_timeout_ms = stop_timeout.map(|t| t.as_millis() as u64),
            "Starting majakka"
        );

        // ── 3. Init metrics ──────────────────────────────────────
        Metrics::init()?;

        // ── 4. Per-bridge configuration ──────────────────────────
        let bridge_configs = config.bridge_configs()?;
        if let Some(path) = &config.bridge_config_path {
            info!(path = %path.display(), bridges = bridge_configs.len(), "Loaded bridge configuration");
        }

        // ── 5. User registers bridges ────────────────────────────
        let coordinator = LifecycleCoordinator::from_config(&config);
        let mut coordinator = configure(coordinator).await?;

        if coordinator.registry().is_empty() {
            warn!("No bridges registered - nothing will be published");
        }

        // ── 6. Metrics HTTP server ───────────────────────────────
        let metrics_handle = if self.metrics_enabled {
            let addr = self.metrics_addr(&config);
            Some(MetricsServer::start(addr, Some(coordinator.last_report())))
        } else {
            None
        };

        // ── 7. Start every bridge ────────────────────────────────
        let report = coordinator.start_all(&bridge_configs, start_timeout).await?;
        log_report(&report);

        // ── 8. Wait for shutdown ─────────────────────────────────
        shutdown_signal().await;

        // ── 9. Stop every bridge ─────────────────────────────────
        let report = coordinator.stop_all(stop_timeout).await;
        log_report(&report);

        if let Some(handle) = metrics_handle {
            handle.abort();
        }
        info!(records = coordinator.session().len(), "majakka shutdown complete");

        Ok(())
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Log an aggregate result, one line per failed bridge.
fn log_report(report: &AggregateResult) {
    for failure in &report.failed {
        warn!(
            operation = %report.operation,
            bridge = %failure.bridge,
            kind = %failure.kind,
            error = %failure.message,
            "Bridge did not complete"
        );
    }
    info!(
        operation = %report.operation,
        outcome = ?report.outcome(),
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "Lifecycle report"
    );
}

/// Initialise the tracing subscriber based on config.
fn init_tracing(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_level.clone().into());

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.log_format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_port_overrides_config() {
        let config = Config::default();
        let builder = RuntimeBuilder::new().metrics_port(9191);
        assert_eq!(builder.metrics_addr(&config).port(), 9191);
        assert_eq!(RuntimeBuilder::new().metrics_addr(&config), config.metrics_addr);
    }

    #[test]
    fn test_timeouts_fall_back_to_config() {
        let builder = RuntimeBuilder::new().start_timeout(None);
        assert_eq!(builder.start_timeout, Some(None));
        assert_eq!(builder.stop_timeout, None);
        assert!(!RuntimeBuilder::new().disable_metrics().metrics_enabled);
    }
}
