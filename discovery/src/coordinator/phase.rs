//! Fan-out and barrier for one lifecycle phase
//!
//! Each bridge call runs in its own task and reports through a completion
//! signal. The barrier waits on every signal against a single shared
//! deadline and returns the outcomes in the order the plan listed them.
//! Tasks still running at the deadline are detached, never aborted, and
//! their publishing handle is retired so they can no longer add records.

use crate::error::ErrorKind;
use crate::registry::BridgeId;
use crate::session::{BridgeHandle, DiscoverySession};
use crate::signal::{Completion, CompletionOutcome, completion_pair};
use futures::future::join_all;
use majakka_core::{Bridge, BridgeConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// What the coordinator decided for one bridge before the barrier
pub(super) enum Step {
    /// Not called; reported as a failure right away
    Skip { kind: ErrorKind, message: String },
    /// Called; wait for its completion
    Wait(Pending),
}

/// A bridge call in flight
pub(super) struct Pending {
    completion: Completion,
    /// Handle the call publishes through
    handle: BridgeHandle,
}

/// How one bridge came out of the barrier
pub(super) enum Resolution {
    Skipped { kind: ErrorKind, message: String },
    Finished(CompletionOutcome),
}

/// Run `bridge.start` in its own task
pub(super) fn spawn_start(
    session: &Arc<DiscoverySession>,
    id: &BridgeId,
    bridge: Arc<dyn Bridge>,
    config: BridgeConfig,
) -> Pending {
    let (signal, completion) = completion_pair();
    let handle = session.handle(id.clone());
    let task_handle = handle.clone();

    tokio::spawn(async move {
        let handle = task_handle;
        let result = bridge.start(&handle, config).await;
        if !signal.complete(result) {
            debug!(bridge = %handle.owner(), "Start completed after the barrier gave up");
        }
    });

    Pending { completion, handle }
}

/// Run `bridge.stop` in its own task
pub(super) fn spawn_stop(
    session: &Arc<DiscoverySession>,
    id: &BridgeId,
    bridge: Arc<dyn Bridge>,
) -> Pending {
    let (signal, completion) = completion_pair();
    let handle = session.handle(id.clone());
    let task_handle = handle.clone();

    tokio::spawn(async move {
        let handle = task_handle;
        let result = bridge.stop(&handle).await;
        if !signal.complete(result) {
            debug!(bridge = %handle.owner(), "Stop completed after the barrier gave up");
        }
    });

    Pending { completion, handle }
}

/// Wait for every step, bounded by one deadline for the whole set
///
/// A timeout too large to represent as an instant means no deadline.
pub(super) async fn barrier(
    plan: Vec<(BridgeId, Step)>,
    timeout: Option<Duration>,
) -> Vec<(BridgeId, Resolution)> {
    let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

    let waits = plan.into_iter().map(|(id, step)| async move {
        let resolution = match step {
            Step::Skip { kind, message } => Resolution::Skipped { kind, message },
            Step::Wait(Pending { completion, handle }) => {
                let outcome = completion.wait_until(deadline).await;
                if outcome == CompletionOutcome::TimedOut {
                    handle.retire();
                }
                Resolution::Finished(outcome)
            }
        };
        (id, resolution)
    });

    join_all(waits).await
}

/// Report message for an outcome that isn't a success
pub(super) fn failure_of(
    outcome: CompletionOutcome,
    timeout: Option<Duration>,
) -> Option<(ErrorKind, String)> {
    match outcome {
        CompletionOutcome::Completed => None,
        CompletionOutcome::Failed(e) => Some((ErrorKind::BackendFailure, e.to_string())),
        CompletionOutcome::Abandoned => Some((
            ErrorKind::BackendFailure,
            "bridge task ended without signalling completion".to_string(),
        )),
        CompletionOutcome::TimedOut => Some((
            ErrorKind::Timeout,
            format!(
                "did not complete within {}ms",
                timeout.map(|t| t.as_millis()).unwrap_or_default()
            ),
        )),
    }
}
