//! Lifecycle state machines for bridges and the coordinator
//!
//! # Bridge transitions
//!
//! ```text
//! Idle ──► Starting ──► Running ──► Stopping ──► Stopped
//!             ▲                        ▲            │
//!             └────────────────────────┼────────────┘ (restart)
//!                                      │
//!   any ──► Failed ────────────────────┘ (cleanup)
//! ```
//!
//! `Running` is only reachable through `Starting`.

use serde::Serialize;
use std::fmt;

/// Lifecycle state of a registered bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    /// Registered, never started
    Idle,
    /// `start` in flight
    Starting,
    /// Started successfully
    Running,
    /// `stop` in flight
    Stopping,
    /// Stopped cleanly
    Stopped,
    /// Start or stop failed, or timed out
    Failed,
}

impl BridgeState {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: BridgeState) -> bool {
        use BridgeState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Running)
                | (Running, Stopping)
                | (Stopping, Stopped)
                | (Stopped, Starting)
                | (Failed, Stopping)
                | (_, Failed)
        )
    }

    /// Whether a `start` may be issued from this state
    pub fn is_startable(self) -> bool {
        matches!(self, BridgeState::Idle | BridgeState::Stopped)
    }

    /// Whether `stop_all` has to stop a bridge in this state
    pub fn needs_stop(self) -> bool {
        matches!(self, BridgeState::Running | BridgeState::Failed)
    }

    /// Whether the bridge may be unregistered in this state
    pub fn is_detachable(self) -> bool {
        matches!(self, BridgeState::Idle | BridgeState::Stopped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BridgeState::Idle => "idle",
            BridgeState::Starting => "starting",
            BridgeState::Running => "running",
            BridgeState::Stopping => "stopping",
            BridgeState::Stopped => "stopped",
            BridgeState::Failed => "failed",
        }
    }

    /// Gauge value (0=idle .. 5=failed)
    pub fn as_metric_value(self) -> f64 {
        match self {
            BridgeState::Idle => 0.0,
            BridgeState::Starting => 1.0,
            BridgeState::Running => 2.0,
            BridgeState::Stopping => 3.0,
            BridgeState::Stopped => 4.0,
            BridgeState::Failed => 5.0,
        }
    }

    /// Inverse of [`as_metric_value`](Self::as_metric_value)
    pub fn from_metric_value(value: f64) -> Option<Self> {
        match value as i64 {
            0 => Some(BridgeState::Idle),
            1 => Some(BridgeState::Starting),
            2 => Some(BridgeState::Running),
            3 => Some(BridgeState::Stopping),
            4 => Some(BridgeState::Stopped),
            5 => Some(BridgeState::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of the coordinator itself
///
/// `Created → Starting → (Running | PartiallyStarted) → Stopping → Stopped`,
/// and `Stopped → Starting` for a new cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Created,
    Starting,
    Running,
    PartiallyStarted,
    Stopping,
    Stopped,
}

impl CoordinatorState {
    /// Whether `start_all` may be called
    pub fn can_start(self) -> bool {
        matches!(self, CoordinatorState::Created | CoordinatorState::Stopped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CoordinatorState::Created => "created",
            CoordinatorState::Starting => "starting",
            CoordinatorState::Running => "running",
            CoordinatorState::PartiallyStarted => "partially_started",
            CoordinatorState::Stopping => "stopping",
            CoordinatorState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
