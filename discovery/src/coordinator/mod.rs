//! Lifecycle coordinator
//!
//! Owns the bridge registry and the discovery session, and drives every
//! registered bridge through `start` and `stop` as one unit.
//!
//! # Policy
//!
//! - Bridges start and stop concurrently, initiated in registration order
//! - The coordinator waits for every completion signal (one barrier per
//!   call), optionally bounded by a single deadline
//! - A failing or timed-out bridge is marked `Failed` and reported under its
//!   own identity; the others carry on. There is no rollback: a partial
//!   start leaves the successful bridges `Running` until `stop_all`
//! - Calling `start_all` twice without `stop_all` in between is a
//!   synchronous `InvalidState` error and touches no bridge
//!
//! `start_all` and `stop_all` are not cancel-safe: dropping the future
//! mid-barrier leaves bridges in `Starting`/`Stopping`.
//!
//! # Example
//!
//! ```ignore
//! let mut coordinator = LifecycleCoordinator::new(Arc::new(DiscoverySession::new("edge")));
//! coordinator.register(Arc::new(StaticBridge::new("static").with_record(record)))?;
//!
//! let report = coordinator.start_all(&BridgeConfigs::new(), Some(Duration::from_secs(5))).await?;
//! // ...
//! let report = coordinator.stop_all(Some(Duration::from_secs(5))).await;
//! ```

mod phase;

use crate::config::{BridgeConfigs, Config};
use crate::error::{DiscoveryError, ErrorKind, Result};
use crate::metrics::Metrics;
use crate::registry::{BridgeId, BridgeRegistry, RegisteredBridge};
use crate::report::{AggregateResult, Operation};
use crate::session::DiscoverySession;
use crate::signal::CompletionOutcome;
use crate::state::{BridgeState, CoordinatorState};
use majakka_core::{Bridge, BridgeConfig};
use parking_lot::RwLock;
use phase::{Resolution, Step};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Most recent aggregate result, shared with the metrics server
pub type SharedReport = Arc<RwLock<Option<AggregateResult>>>;

/// Coordinator behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Remove the records a bridge published once it has stopped
    /// (successfully or not)
    pub purge_on_stop: bool,
}

/// Sequences the lifecycle of every registered bridge
pub struct LifecycleCoordinator {
    registry: BridgeRegistry,
    session: Arc<DiscoverySession>,
    state: CoordinatorState,
    options: CoordinatorOptions,
    last_report: SharedReport,
}

impl LifecycleCoordinator {
    /// Create a coordinator over `session` with default options
    pub fn new(session: Arc<DiscoverySession>) -> Self {
        Self::with_options(session, CoordinatorOptions::default())
    }

    pub fn with_options(session: Arc<DiscoverySession>, options: CoordinatorOptions) -> Self {
        Self {
            registry: BridgeRegistry::new(),
            session,
            state: CoordinatorState::Created,
            options,
            last_report: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a coordinator and its session from process configuration
    pub fn from_config(config: &Config) -> Self {
        let session = Arc::new(DiscoverySession::with_capacity(
            config.session_name.clone(),
            config.announce_capacity,
        ));
        Self::with_options(
            session,
            CoordinatorOptions {
                purge_on_stop: config.purge_on_stop,
            },
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a bridge; it starts out `Idle`
    pub fn register(&mut self, bridge: Arc<dyn Bridge>) -> Result<BridgeId> {
        self.registry.register(bridge)
    }

    /// Unregister an `Idle` or `Stopped` bridge
    pub fn unregister(&mut self, id: &BridgeId) -> Result<Arc<dyn Bridge>> {
        self.registry.unregister(id)
    }

    /// Registered bridges in registration order
    pub fn bridges(&self) -> std::slice::Iter<'_, RegisteredBridge> {
        self.registry.list()
    }

    pub fn registry(&self) -> &BridgeRegistry {
        &self.registry
    }

    pub fn bridge_state(&self, id: &BridgeId) -> Option<BridgeState> {
        self.registry.state(id)
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn session(&self) -> &Arc<DiscoverySession> {
        &self.session
    }

    pub fn options(&self) -> CoordinatorOptions {
        self.options
    }

    /// Handle on the most recent aggregate result
    pub fn last_report(&self) -> SharedReport {
        Arc::clone(&self.last_report)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Whole-set lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Start every `Idle` or `Stopped` bridge concurrently
    ///
    /// Each bridge gets its slice of `configs` (empty if it has none).
    /// Returns once every bridge has completed or `timeout` has elapsed.
    /// `Failed` bridges are not started; they are reported as
    /// `InvalidState` until a `stop_all` cleans them up. Bridges in any
    /// other state are left alone.
    ///
    /// Fails synchronously with `InvalidState`, without touching any
    /// bridge, unless the coordinator is `Created` or `Stopped`.
    pub async fn start_all(
        &mut self,
        configs: &BridgeConfigs,
        timeout: Option<Duration>,
    ) -> Result<AggregateResult> {
        if !self.state.can_start() {
            return Err(DiscoveryError::invalid_state(
                "coordinator",
                self.state,
                "start_all",
            ));
        }

        let started = Instant::now();
        self.state = CoordinatorState::Starting;
        info!(
            session = self.session.name(),
            bridges = self.registry.len(),
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            "Starting bridges"
        );

        let mut plan = Vec::new();
        for id in self.registry.ids() {
            let config = configs.config_for(&id);
            if let Some(step) = self.plan_start(&id, config).unwrap_or_else(|e| Some(skip(e))) {
                plan.push((id, step));
            }
        }

        let report = self.settle(Operation::Start, plan, timeout).await;

        self.state = if report.is_success() {
            CoordinatorState::Running
        } else {
            CoordinatorState::PartiallyStarted
        };
        self.finish(&report, started);
        Ok(report)
    }

    /// Stop every `Running` or `Failed` bridge concurrently
    ///
    /// Best effort: a bridge that fails or times out is marked `Failed` and
    /// reported, the rest still stop. Always leaves the coordinator
    /// `Stopped`, except that a `Created` coordinator with nothing to stop
    /// stays `Created`.
    pub async fn stop_all(&mut self, timeout: Option<Duration>) -> AggregateResult {
        let started = Instant::now();
        let targets = self.registry.ids_where(BridgeState::needs_stop);

        if targets.is_empty() && self.state == CoordinatorState::Created {
            let report = AggregateResult::new(Operation::Stop);
            self.finish(&report, started);
            return report;
        }

        self.state = CoordinatorState::Stopping;
        info!(
            session = self.session.name(),
            bridges = targets.len(),
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            "Stopping bridges"
        );

        let mut plan = Vec::with_capacity(targets.len());
        for id in targets {
            let step = self.plan_stop(&id).unwrap_or_else(skip);
            plan.push((id, step));
        }

        let report = self.settle(Operation::Stop, plan, timeout).await;

        self.state = CoordinatorState::Stopped;
        self.finish(&report, started);
        report
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Single-bridge lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Start one `Idle` or `Stopped` bridge
    ///
    /// `InvalidState` if the bridge is in any other state. The coordinator's
    /// own state is not changed.
    pub async fn start_bridge(
        &mut self,
        id: &BridgeId,
        config: BridgeConfig,
        timeout: Option<Duration>,
    ) -> Result<AggregateResult> {
        let state = self
            .registry
            .state(id)
            .ok_or_else(|| DiscoveryError::NotRegistered(id.clone()))?;
        if !state.is_startable() {
            return Err(DiscoveryError::invalid_state(
                format!("bridge '{id}'"),
                state,
                "start",
            ));
        }

        let started = Instant::now();
        let step = self.plan_start(id, config)?;
        let plan = step.map(|step| vec![(id.clone(), step)]).unwrap_or_default();
        let report = self.settle(Operation::Start, plan, timeout).await;
        self.finish(&report, started);
        Ok(report)
    }

    /// Stop one bridge
    ///
    /// Stopping an `Idle` or `Stopped` bridge is a successful no-op that
    /// never calls into the bridge. `InvalidState` while the bridge is
    /// `Starting` or `Stopping`.
    pub async fn stop_bridge(
        &mut self,
        id: &BridgeId,
        timeout: Option<Duration>,
    ) -> Result<AggregateResult> {
        let state = self
            .registry
            .state(id)
            .ok_or_else(|| DiscoveryError::NotRegistered(id.clone()))?;

        let started = Instant::now();
        let report = if state.needs_stop() {
            let step = self.plan_stop(id)?;
            self.settle(Operation::Stop, vec![(id.clone(), step)], timeout)
                .await
        } else if state.is_detachable() {
            let mut report = AggregateResult::new(Operation::Stop);
            report.push_success(id.clone());
            report
        } else {
            return Err(DiscoveryError::invalid_state(
                format!("bridge '{id}'"),
                state,
                "stop",
            ));
        };

        self.finish(&report, started);
        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Phase plumbing
    // ─────────────────────────────────────────────────────────────────────────

    /// Mark a bridge `Starting` and spawn its `start`, or decide to skip it
    fn plan_start(&mut self, id: &BridgeId, config: BridgeConfig) -> Result<Option<Step>> {
        let Some(entry) = self.registry.get(id) else {
            return Err(DiscoveryError::NotRegistered(id.clone()));
        };
        let state = entry.state();

        if state == BridgeState::Failed {
            return Ok(Some(Step::Skip {
                kind: ErrorKind::InvalidState,
                message: format!(
                    "bridge is failed ({}); stop it before starting again",
                    entry.last_error().unwrap_or("no error recorded")
                ),
            }));
        }
        if !state.is_startable() {
            return Ok(None);
        }

        let bridge = Arc::clone(entry.bridge());
        self.registry.transition(id, BridgeState::Starting)?;
        Ok(Some(Step::Wait(phase::spawn_start(
            &self.session,
            id,
            bridge,
            config,
        ))))
    }

    /// Mark a bridge `Stopping` and spawn its `stop`
    fn plan_stop(&mut self, id: &BridgeId) -> Result<Step> {
        let bridge = self
            .registry
            .get(id)
            .map(|entry| Arc::clone(entry.bridge()))
            .ok_or_else(|| DiscoveryError::NotRegistered(id.clone()))?;
        self.registry.transition(id, BridgeState::Stopping)?;
        Ok(Step::Wait(phase::spawn_stop(&self.session, id, bridge)))
    }

    /// Wait for the barrier and apply every outcome, in plan order
    async fn settle(
        &mut self,
        operation: Operation,
        plan: Vec<(BridgeId, Step)>,
        timeout: Option<Duration>,
    ) -> AggregateResult {
        let mut report = AggregateResult::new(operation);

        for (id, resolution) in phase::barrier(plan, timeout).await {
            let failure = match resolution {
                Resolution::Skipped { kind, message } => Some((kind, message)),
                Resolution::Finished(outcome) => self.apply(operation, &id, outcome, timeout),
            };

            match failure {
                None => report.push_success(id),
                Some((kind, message)) => {
                    match operation {
                        Operation::Start => {
                            warn!(bridge = %id, kind = %kind, error = %message, "Bridge failed to start")
                        }
                        Operation::Stop => {
                            error!(bridge = %id, kind = %kind, error = %message, "Bridge failed to stop")
                        }
                    }
                    report.push_failure(id, kind, message);
                }
            }
        }

        report
    }

    /// Move a bridge out of `Starting`/`Stopping` according to its outcome
    fn apply(
        &mut self,
        operation: Operation,
        id: &BridgeId,
        outcome: CompletionOutcome,
        timeout: Option<Duration>,
    ) -> Option<(ErrorKind, String)> {
        let failure = phase::failure_of(outcome, timeout);

        let transition = match &failure {
            None => {
                let next = match operation {
                    Operation::Start => BridgeState::Running,
                    Operation::Stop => BridgeState::Stopped,
                };
                self.registry.transition(id, next)
            }
            Some((_, message)) => self.registry.fail(id, message.clone()),
        };

        if operation == Operation::Stop && self.options.purge_on_stop {
            self.session.remove_records_of(id);
        }

        match transition {
            Ok(_) => {
                if failure.is_none() {
                    info!(bridge = %id, operation = %operation, "Bridge completed");
                }
                failure
            }
            // Only reachable if the bridge was moved behind the coordinator's back
            Err(e) => failure.or(Some((ErrorKind::InvalidState, e.to_string()))),
        }
    }

    /// Publish the report and record metrics
    fn finish(&self, report: &AggregateResult, started: Instant) {
        let elapsed = started.elapsed();
        info!(
            operation = %report.operation,
            state = %self.state,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Lifecycle operation finished"
        );

        if let Some(metrics) = Metrics::get() {
            metrics.record_report(report, elapsed);
        }
        *self.last_report.write() = Some(report.clone());
    }
}

/// A bridge that couldn't be scheduled is reported, not returned
fn skip(err: DiscoveryError) -> Step {
    Step::Skip {
        kind: err.kind().unwrap_or(ErrorKind::InvalidState),
        message: err.to_string(),
    }
}
