//! Error types for majakka

use crate::registry::BridgeId;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

// Re-export BridgeError from majakka-core
pub use majakka_core::BridgeError;

/// Result type alias for majakka operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Main error type for majakka
///
/// These are the errors the coordinator raises synchronously: programming
/// errors (wrong lifecycle phase, duplicate registration) and setup errors
/// (configuration, metrics). Failures of individual bridges are never
/// returned as a `DiscoveryError`; they end up in the aggregate result.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Operation attempted in the wrong lifecycle phase
    #[error("cannot {operation} {target} while it is {state}")]
    InvalidState {
        /// What the operation targeted, e.g. `coordinator` or `bridge 'dns'`
        target: String,
        /// Current state of the target
        state: String,
        /// The rejected operation
        operation: &'static str,
    },

    /// Bridge instance (or another bridge with the same name) already registered
    #[error("bridge '{0}' is already registered")]
    AlreadyRegistered(BridgeId),

    /// No bridge with this identity
    #[error("bridge '{0}' is not registered")]
    NotRegistered(BridgeId),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Metrics error
    #[error("metrics error: {0}")]
    Metrics(String),
}

impl DiscoveryError {
    /// Build an `InvalidState` error
    pub fn invalid_state(
        target: impl Into<String>,
        state: impl fmt::Display,
        operation: &'static str,
    ) -> Self {
        DiscoveryError::InvalidState {
            target: target.into(),
            state: state.to_string(),
            operation,
        }
    }

    /// Classify the error for reporting, if it has a lifecycle kind
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            DiscoveryError::InvalidState { .. } => Some(ErrorKind::InvalidState),
            DiscoveryError::AlreadyRegistered(_) => Some(ErrorKind::AlreadyRegistered),
            DiscoveryError::NotRegistered(_) => Some(ErrorKind::NotRegistered),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DiscoveryError {
    fn from(err: serde_json::Error) -> Self {
        DiscoveryError::Serialization(err.to_string())
    }
}

/// Error classification used in aggregate results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Operation attempted in the wrong lifecycle phase
    InvalidState,
    /// Duplicate registration
    AlreadyRegistered,
    /// Unknown bridge
    NotRegistered,
    /// Completion signal not received before the deadline
    Timeout,
    /// The bridge reported its own error (or its task died)
    BackendFailure,
    /// Some, but not all, bridges failed
    PartialFailure,
}

impl ErrorKind {
    /// Label used in logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::AlreadyRegistered => "already_registered",
            ErrorKind::NotRegistered => "not_registered",
            ErrorKind::Timeout => "timeout",
            ErrorKind::BackendFailure => "backend_failure",
            ErrorKind::PartialFailure => "partial_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
