//! Convenience re-exports for bridge authors.
//!
//! ```rust
//! use majakka_runtime::prelude::*;
//! ```

// Bridge contract
pub use majakka_core::{Bridge, BridgeConfig, BridgeError, ServiceDiscovery};

// Records
pub use majakka_core::location::{GrpcLocation, HttpLocation};
pub use majakka_core::{Record, Status};

// Coordinator
pub use majakka_discovery::{
    AggregateResult, BridgeConfigs, BridgeId, BridgeState, CoordinatorState, DiscoverySession,
    LifecycleCoordinator,
};

// Built-in bridges
pub use majakka_discovery::StaticBridge;

// Error types
pub use majakka_discovery::{DiscoveryError, ErrorKind};

// Shared ownership for registration
pub use std::sync::Arc;

// Runtime
pub use crate::RuntimeBuilder;
