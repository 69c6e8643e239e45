//! majakka - pluggable service discovery bridges
//!
//! Bridges import service descriptions from external discovery backends
//! (DNS, Consul, Kubernetes, static lists, ...) into one shared discovery
//! session. This crate owns them and sequences their lifecycle.
//!
//! # Architecture
//!
//! ```text
//!                      ┌────────────────────────────┐
//! register ──────────► │    LifecycleCoordinator    │
//! start_all/stop_all ► │  BridgeRegistry (ordered)  │
//!                      └──────┬──────────┬──────────┘
//!                   spawn per │          │ barrier (one deadline)
//!                     bridge  ▼          ▲
//!                  Bridge::start/stop ── CompletionSignal
//!                             │
//!                             ▼ BridgeHandle (ServiceDiscovery)
//!                      DiscoverySession ── RecordStore ── announcements
//! ```
//!
//! Individual bridge failures never surface as errors from the
//! coordinator; they are reported per bridge in an [`AggregateResult`].

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod bridges;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod metrics_server;
pub mod registry;
pub mod report;
pub mod session;
pub mod signal;
pub mod state;
pub mod store;
pub mod usage;

pub use bridges::StaticBridge;
pub use config::{BridgeConfigs, Config, LogFormat};
pub use coordinator::{CoordinatorOptions, LifecycleCoordinator, SharedReport};
pub use error::{BridgeError, DiscoveryError, ErrorKind, Result};
pub use metrics_server::MetricsServer;
pub use registry::{BridgeId, BridgeRegistry, RegisteredBridge};
pub use report::{AggregateResult, BridgeFailure, Operation, Outcome};
pub use session::{Announcement, BridgeHandle, DiscoverySession};
pub use signal::{Completion, CompletionOutcome, CompletionSignal, completion_pair};
pub use state::{BridgeState, CoordinatorState};
pub use store::RecordStore;
pub use usage::{Binding, Usage, UsageKind};

pub use majakka_core::{Bridge, BridgeConfig, Record, ServiceDiscovery, Status};
