//! majakka-core - Core types for majakka service discovery
//!
//! This crate provides the foundational types shared between the majakka
//! coordinator and external discovery bridges:
//!
//! - [`Bridge`] trait - async start/stop contract every backend adapter implements
//! - [`ServiceDiscovery`] trait - the publishing seam a bridge receives
//! - [`Record`] - a published service description
//! - [`BridgeConfig`] - the per-bridge configuration document
//! - [`BridgeError`] - error type for bridge operations
//! - [`location`] - typed record locations (HTTP, gRPC)
//!
//! # Why this crate exists
//!
//! Bridge crates (DNS, Consul, Kubernetes, ...) only need the contract and
//! the record model. Depending on `majakka-discovery` would pull in the
//! coordinator, metrics and HTTP stack, and `majakka-discovery` may want to
//! depend on some of those bridges itself:
//!
//! ```text
//! majakka-core ◄── majakka-discovery ◄── majakka-runtime
//!     ▲
//!     └────────── consul-bridge (external)
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(missing_docs)]

mod bridge;
mod config;
mod error;
/// Typed record locations
pub mod location;
/// The published service description
pub mod record;

pub use bridge::{Bridge, ServiceDiscovery};
pub use config::BridgeConfig;
pub use error::BridgeError;
pub use location::{GrpcLocation, HttpLocation};
pub use record::{Record, Status};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    // ==========================================================================
    // BridgeError Tests
    // ==========================================================================

    #[test]
    fn test_bridge_error_init_display() {
        let err = BridgeError::Init("token expired".to_string());
        assert_eq!(err.to_string(), "initialization failed: token expired");
    }

    #[test]
    fn test_bridge_error_config_display() {
        let err = BridgeError::Config("missing string key 'zone'".to_string());
        assert_eq!(
            err.to_string(),
            "invalid configuration: missing string key 'zone'"
        );
    }

    #[test]
    fn test_bridge_error_connection_display() {
        let err = BridgeError::Connection("DNS lookup failed".to_string());
        assert_eq!(err.to_string(), "connection error: DNS lookup failed");
    }

    #[test]
    fn test_bridge_error_not_found_display() {
        let err = BridgeError::NotFound("01HREG".to_string());
        assert_eq!(err.to_string(), "record not found: 01HREG");
    }

    #[test]
    fn test_bridge_error_shutdown_display() {
        let err = BridgeError::Shutdown("watch still open".to_string());
        assert_eq!(err.to_string(), "shutdown error: watch still open");
    }

    #[test]
    fn test_bridge_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BridgeError>();
    }

    // ==========================================================================
    // Bridge Trait Tests
    // ==========================================================================

    /// Publisher that keeps records in a vector
    #[derive(Default)]
    struct VecDiscovery {
        records: Mutex<Vec<Record>>,
        next: AtomicUsize,
    }

    #[async_trait]
    impl ServiceDiscovery for VecDiscovery {
        async fn publish(&self, mut record: Record) -> Result<Record, BridgeError> {
            let id = self.next.fetch_add(1, Ordering::Relaxed);
            record.registration = Some(format!("reg-{id}"));
            self.records.lock().unwrap().push(record.clone());
            Ok(record)
        }

        async fn unpublish(&self, registration: &str) -> Result<(), BridgeError> {
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| r.registration.as_deref() != Some(registration));
            if records.len() == before {
                return Err(BridgeError::NotFound(registration.to_string()));
            }
            Ok(())
        }
    }

    /// Bridge that publishes the hosts listed in its config
    struct ListBridge {
        published: Mutex<Vec<String>>,
        stopped: AtomicBool,
    }

    impl ListBridge {
        fn new() -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                stopped: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Bridge for ListBridge {
        fn name(&self) -> &str {
            "list"
        }

        async fn start(
            &self,
            discovery: &dyn ServiceDiscovery,
            config: BridgeConfig,
        ) -> Result<(), BridgeError> {
            let hosts: Vec<String> = config.get_as("hosts")?.unwrap_or_default();
            for host in hosts {
                let record = discovery
                    .publish(Record::http_endpoint(host.clone(), &host, 80, "/"))
                    .await?;
                if let Some(registration) = record.registration {
                    self.published.lock().unwrap().push(registration);
                }
            }
            Ok(())
        }

        async fn stop(&self, discovery: &dyn ServiceDiscovery) -> Result<(), BridgeError> {
            let registrations: Vec<String> = self.published.lock().unwrap().drain(..).collect();
            for registration in registrations {
                discovery.unpublish(&registration).await?;
            }
            self.stopped.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_bridge_start_publishes_records() {
        let discovery = VecDiscovery::default();
        let bridge = ListBridge::new();
        let config = BridgeConfig::new().with("hosts", serde_json::json!(["acme.org", "example.com"]));

        bridge.start(&discovery, config).await.unwrap();

        let records = discovery.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].endpoint(), Some("http://acme.org:80/"));
    }

    #[tokio::test]
    async fn test_bridge_stop_unpublishes_records() {
        let discovery = VecDiscovery::default();
        let bridge = ListBridge::new();
        let config = BridgeConfig::new().with("hosts", serde_json::json!(["acme.org"]));

        bridge.start(&discovery, config).await.unwrap();
        bridge.stop(&discovery).await.unwrap();

        assert!(discovery.records.lock().unwrap().is_empty());
        assert!(bridge.stopped.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_bridge_start_with_empty_config() {
        let discovery = VecDiscovery::default();
        let bridge = ListBridge::new();

        assert!(bridge.start(&discovery, BridgeConfig::default()).await.is_ok());
        assert!(discovery.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bridge_start_rejects_bad_config() {
        let discovery = VecDiscovery::default();
        let bridge = ListBridge::new();
        let config = BridgeConfig::new().with("hosts", "not-a-list");

        let result = bridge.start(&discovery, config).await;
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[tokio::test]
    async fn test_bridge_is_object_safe() {
        let bridge: Arc<dyn Bridge> = Arc::new(ListBridge::new());
        let discovery = VecDiscovery::default();

        assert_eq!(bridge.name(), "list");
        assert!(bridge.start(&discovery, BridgeConfig::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_bridge_default_stop_succeeds() {
        struct MinimalBridge;

        #[async_trait]
        impl Bridge for MinimalBridge {
            fn name(&self) -> &str {
                "minimal"
            }
            async fn start(
                &self,
                _discovery: &dyn ServiceDiscovery,
                _config: BridgeConfig,
            ) -> Result<(), BridgeError> {
                Ok(())
            }
            // Note: not overriding stop - uses default
        }

        let discovery = VecDiscovery::default();
        assert!(MinimalBridge.stop(&discovery).await.is_ok());
    }

    #[tokio::test]
    async fn test_unpublish_unknown_registration() {
        let discovery = VecDiscovery::default();
        let result = discovery.unpublish("nope").await;
        assert_eq!(result, Err(BridgeError::NotFound("nope".to_string())));
    }
}
