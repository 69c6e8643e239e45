//! Prometheus metrics for majakka

use crate::error::{DiscoveryError, ErrorKind, Result};
use crate::report::{AggregateResult, Operation, Outcome};
use crate::state::BridgeState;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramVec, TextEncoder, register_counter_vec,
    register_gauge_vec, register_histogram_vec,
};
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Duration;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// All majakka metrics
pub struct Metrics {
    // ─────────────────────────────────────────────────────────────────────────
    // Bridge state
    // ─────────────────────────────────────────────────────────────────────────
    /// Current lifecycle state per bridge (see `BridgeState::as_metric_value`)
    pub bridge_state: GaugeVec,

    /// Bridge failures (by bridge, error kind)
    pub bridge_failures: CounterVec,

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle operations
    // ─────────────────────────────────────────────────────────────────────────
    /// Completed coordinator operations (by operation, outcome)
    pub lifecycle_operations: CounterVec,

    /// Wall time of coordinator operations, barrier included
    pub lifecycle_duration_seconds: HistogramVec,

    // ─────────────────────────────────────────────────────────────────────────
    // Record store
    // ─────────────────────────────────────────────────────────────────────────
    /// Records currently in each session's store (by session name)
    pub records_published: GaugeVec,
}

/// Number of bridges per lifecycle state, read back from the state gauge
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BridgeStateCounts {
    pub idle: usize,
    pub starting: usize,
    pub running: usize,
    pub stopping: usize,
    pub stopped: usize,
    pub failed: usize,
}

impl BridgeStateCounts {
    fn add(&mut self, state: BridgeState) {
        match state {
            BridgeState::Idle => self.idle += 1,
            BridgeState::Starting => self.starting += 1,
            BridgeState::Running => self.running += 1,
            BridgeState::Stopping => self.stopping += 1,
            BridgeState::Stopped => self.stopped += 1,
            BridgeState::Failed => self.failed += 1,
        }
    }

    /// Total bridges counted
    pub fn total(&self) -> usize {
        self.idle + self.starting + self.running + self.stopping + self.stopped + self.failed
    }
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    ///
    /// Returns error if metric registration fails.
    pub fn init() -> Result<&'static Metrics> {
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            bridge_state: register_gauge_vec!(
                "majakka_bridge_state",
                "Bridge lifecycle state (0 = idle, 1 = starting, 2 = running, 3 = stopping, 4 = stopped, 5 = failed)",
                &["bridge"]
            )
            .map_err(|e| DiscoveryError::Metrics(format!("bridge_state: {e}")))?,

            bridge_failures: register_counter_vec!(
                "majakka_bridge_failures_total",
                "Total bridge start/stop failures",
                &["bridge", "kind"]
            )
            .map_err(|e| DiscoveryError::Metrics(format!("bridge_failures: {e}")))?,

            lifecycle_operations: register_counter_vec!(
                "majakka_lifecycle_operations_total",
                "Total coordinator lifecycle operations",
                &["operation", "outcome"]
            )
            .map_err(|e| DiscoveryError::Metrics(format!("lifecycle_operations: {e}")))?,

            lifecycle_duration_seconds: register_histogram_vec!(
                "majakka_lifecycle_duration_seconds",
                "Time spent in coordinator lifecycle operations",
                &["operation"],
                // Buckets: 1ms to 60s
                vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
            )
            .map_err(|e| DiscoveryError::Metrics(format!("lifecycle_duration_seconds: {e}")))?,

            records_published: register_gauge_vec!(
                "majakka_records_published",
                "Number of records in the discovery session store",
                &["session"]
            )
            .map_err(|e| DiscoveryError::Metrics(format!("records_published: {e}")))?,
        };

        // Set the metrics (only succeeds once)
        let _ = METRICS.set(metrics);

        METRICS
            .get()
            .ok_or_else(|| DiscoveryError::Metrics("Failed to initialize metrics".to_string()))
    }

    /// Get the global metrics instance
    ///
    /// Returns None if metrics haven't been initialized yet.
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    /// Set a bridge's state gauge
    pub fn set_bridge_state(&self, bridge: &str, state: BridgeState) {
        self.bridge_state
            .with_label_values(&[bridge])
            .set(state.as_metric_value());
    }

    /// Drop the state series of an unregistered bridge
    pub fn remove_bridge(&self, bridge: &str) {
        let _ = self.bridge_state.remove_label_values(&[bridge]);
    }

    /// Record a bridge failure
    pub fn record_bridge_failure(&self, bridge: &str, kind: ErrorKind) {
        self.bridge_failures
            .with_label_values(&[bridge, kind.as_str()])
            .inc();
    }

    /// Record a finished coordinator operation
    pub fn record_operation(&self, operation: Operation, outcome: Outcome, elapsed: Duration) {
        self.lifecycle_operations
            .with_label_values(&[operation.as_str(), outcome_label(outcome)])
            .inc();
        self.lifecycle_duration_seconds
            .with_label_values(&[operation.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    /// Record an aggregate result: the operation and every failure in it
    pub fn record_report(&self, report: &AggregateResult, elapsed: Duration) {
        for failure in &report.failed {
            self.record_bridge_failure(failure.bridge.as_str(), failure.kind);
        }
        self.record_operation(report.operation, report.outcome(), elapsed);
    }

    /// Update a session's published records gauge
    ///
    /// Sessions sharing a name share the series.
    pub fn set_records_published(&self, session: &str, count: usize) {
        self.records_published
            .with_label_values(&[session])
            .set(count as f64);
    }

    /// Drop the records series of a closed session
    pub fn remove_session(&self, session: &str) {
        let _ = self.records_published.remove_label_values(&[session]);
    }

    /// Records published across every session in the process
    pub fn records_published_total(&self) -> f64 {
        use prometheus::core::Collector;

        self.records_published
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .map(|metric| metric.get_gauge().get_value())
            .sum()
    }

    /// Count bridges per state from the bridge_state GaugeVec
    ///
    /// Iterates registered label values, so bridges of every coordinator in
    /// the process are counted.
    pub fn bridge_state_counts(&self) -> BridgeStateCounts {
        use prometheus::core::Collector;
        use prometheus::proto::MetricFamily;

        let families: Vec<MetricFamily> = self.bridge_state.collect();
        let mut counts = BridgeStateCounts::default();

        for family in &families {
            for metric in family.get_metric() {
                if let Some(state) = BridgeState::from_metric_value(metric.get_gauge().get_value())
                {
                    counts.add(state);
                }
            }
        }

        counts
    }
}

fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Complete => "complete",
        Outcome::Partial => "partial",
        Outcome::Failed => "failed",
    }
}

/// Gather all metrics and encode as Prometheus text format
///
/// Returns the metrics as a String, ready to be served via HTTP.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::registry::BridgeId;

    #[test]
    fn test_metrics_init_is_idempotent() {
        let first = Metrics::init().unwrap();
        let second = Metrics::init().unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(Metrics::get().is_some());
    }

    #[test]
    fn test_bridge_state_counts() {
        let metrics = Metrics::init().unwrap();
        metrics.set_bridge_state("metrics-test-a", BridgeState::Running);
        metrics.set_bridge_state("metrics-test-b", BridgeState::Failed);

        // Other tests share the global registry, so only lower bounds hold
        let counts = metrics.bridge_state_counts();
        assert!(counts.running >= 1);
        assert!(counts.failed >= 1);
        assert!(counts.total() >= 2);

        metrics.remove_bridge("metrics-test-a");
        metrics.remove_bridge("metrics-test-b");
    }

    #[test]
    fn test_record_report_counts_failures() {
        let metrics = Metrics::init().unwrap();
        let mut report = AggregateResult::new(Operation::Start);
        report.push_success(BridgeId::from("metrics-ok"));
        report.push_failure(
            BridgeId::from("metrics-broken"),
            ErrorKind::Timeout,
            "did not complete",
        );

        let before = metrics
            .bridge_failures
            .with_label_values(&["metrics-broken", "timeout"])
            .get();
        metrics.record_report(&report, Duration::from_millis(5));
        let after = metrics
            .bridge_failures
            .with_label_values(&["metrics-broken", "timeout"])
            .get();
        assert_eq!(after - before, 1.0);
    }

    #[test]
    fn test_gather_renders_text_format() {
        let metrics = Metrics::init().unwrap();
        metrics.set_records_published("metrics-gather", 3);

        let text = gather();
        assert!(text.contains("majakka_records_published"));
        assert!(text.contains("session=\"metrics-gather\""));
        metrics.remove_session("metrics-gather");
    }

    #[test]
    fn test_records_published_per_session() {
        let metrics = Metrics::init().unwrap();
        metrics.set_records_published("metrics-session-a", 2);
        metrics.set_records_published("metrics-session-b", 5);

        let gauge = |session: &str| {
            metrics
                .records_published
                .with_label_values(&[session])
                .get()
        };
        assert_eq!(gauge("metrics-session-a"), 2.0);
        assert_eq!(gauge("metrics-session-b"), 5.0);
        assert!(metrics.records_published_total() >= 7.0);

        metrics.remove_session("metrics-session-a");
        metrics.remove_session("metrics-session-b");
    }
}
