//! Aggregate result of a coordinator operation
//!
//! One entry per bridge the operation touched, in registration order. A
//! failing bridge never hides the others: each failure is attributed to the
//! bridge that produced it.

use crate::error::ErrorKind;
use crate::registry::BridgeId;
use serde::Serialize;
use std::fmt;

/// Which lifecycle operation produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Start,
    Stop,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bridge that didn't make it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeFailure {
    pub bridge: BridgeId,
    pub kind: ErrorKind,
    pub message: String,
}

/// Overall shape of an aggregate result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// No bridge failed (including the case of no bridges at all)
    Complete,
    /// At least one bridge failed and at least one succeeded
    Partial,
    /// Every bridge the operation touched failed
    Failed,
}

/// Per-bridge report of a `start_all` / `stop_all` (or single-bridge) call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateResult {
    pub operation: Operation,
    pub succeeded: Vec<BridgeId>,
    pub failed: Vec<BridgeFailure>,
}

impl AggregateResult {
    /// Empty result for `operation`
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub(crate) fn push_success(&mut self, bridge: BridgeId) {
        self.succeeded.push(bridge);
    }

    pub(crate) fn push_failure(
        &mut self,
        bridge: BridgeId,
        kind: ErrorKind,
        message: impl Into<String>,
    ) {
        self.failed.push(BridgeFailure {
            bridge,
            kind,
            message: message.into(),
        });
    }

    /// True if no bridge failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Classify the result
    pub fn outcome(&self) -> Outcome {
        match (self.succeeded.is_empty(), self.failed.is_empty()) {
            (_, true) => Outcome::Complete,
            (false, false) => Outcome::Partial,
            (true, false) => Outcome::Failed,
        }
    }

    /// Error kind describing the result as a whole, `None` on success
    ///
    /// A mixed result is a `PartialFailure`. When everything failed the
    /// shared kind is reported if all failures agree, `BackendFailure`
    /// otherwise.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.outcome() {
            Outcome::Complete => None,
            Outcome::Partial => Some(ErrorKind::PartialFailure),
            Outcome::Failed => {
                let first = self.failed[0].kind;
                if self.failed.iter().all(|f| f.kind == first) {
                    Some(first)
                } else {
                    Some(ErrorKind::BackendFailure)
                }
            }
        }
    }

    /// Failure entry for a bridge, if it failed
    pub fn failure_for(&self, bridge: &BridgeId) -> Option<&BridgeFailure> {
        self.failed.iter().find(|f| f.bridge == *bridge)
    }

    /// Whether a bridge is listed as succeeded
    pub fn succeeded_for(&self, bridge: &BridgeId) -> bool {
        self.succeeded.contains(bridge)
    }

    /// Number of bridges covered
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}
