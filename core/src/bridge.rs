//! Bridge and publishing traits
//!
//! The [`Bridge`] trait is the contract every discovery backend adapter
//! implements. The [`ServiceDiscovery`] trait is the narrow publishing seam
//! a bridge receives: it can publish records and take its own records back,
//! nothing else.

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::record::Record;
use async_trait::async_trait;

/// Publishing interface handed to bridges
///
/// Implemented by the discovery session, scoped to the calling bridge, so
/// every record a bridge publishes is attributed to it.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Publish a record
    ///
    /// On success the returned record carries its `registration` id, which
    /// is needed to update or unpublish it later. Publishing a record that
    /// already carries a registration updates it, and fails with
    /// [`BridgeError::Publish`] unless that registration is currently
    /// published by the caller.
    async fn publish(&self, record: Record) -> Result<Record, BridgeError>;

    /// Unpublish a record by registration id
    ///
    /// Fails with [`BridgeError::NotFound`] if the registration doesn't
    /// exist or wasn't published by this bridge.
    async fn unpublish(&self, registration: &str) -> Result<(), BridgeError>;
}

/// Bridge trait - maps entries of another discovery technology into records
///
/// Each bridge connects one external discovery source (a static list, DNS,
/// a service registry) to the session's record store. Bridges are
/// registered with the lifecycle coordinator, which starts them
/// concurrently and stops them on shutdown.
///
/// # Implementation Requirements
///
/// - Bridges must be `Send + Sync`; `start` and `stop` run on their own tasks
/// - `start` completes exactly once, either `Ok` or with the error that
///   prevented the bridge from running
/// - `stop` must be safe to call after a `start` that failed halfway
/// - Bridges should only unpublish records they published themselves
///
/// # Example
///
/// ```ignore
/// use majakka_core::{Bridge, BridgeConfig, BridgeError, Record, ServiceDiscovery};
/// use async_trait::async_trait;
///
/// struct DnsBridge {
///     resolver: Resolver,
/// }
///
/// #[async_trait]
/// impl Bridge for DnsBridge {
///     fn name(&self) -> &str {
///         "dns"
///     }
///
///     async fn start(
///         &self,
///         discovery: &dyn ServiceDiscovery,
///         config: BridgeConfig,
///     ) -> Result<(), BridgeError> {
///         let zone = config.require_str("zone")?;
///         for srv in self.resolver.srv_lookup(zone).await
///             .map_err(|e| BridgeError::Connection(e.to_string()))?
///         {
///             discovery.publish(Record::http_endpoint(srv.name(), srv.host(), srv.port(), "/")).await?;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Returns the bridge's name
    ///
    /// The name is the bridge's identity: it keys the per-bridge
    /// configuration, owns the records the bridge publishes, and labels
    /// logs, metrics and reports. It must be unique within a coordinator.
    fn name(&self) -> &str;

    /// Start the bridge
    ///
    /// # Arguments
    ///
    /// * `discovery` - where discovered services get published
    /// * `config` - this bridge's configuration; empty if none was given
    ///
    /// # Returns
    ///
    /// * `Ok(())` - the bridge is running
    /// * `Err(BridgeError)` - the bridge could not start
    async fn start(
        &self,
        discovery: &dyn ServiceDiscovery,
        config: BridgeConfig,
    ) -> Result<(), BridgeError>;

    /// Stop the bridge
    ///
    /// Called on shutdown, and on bridges whose start failed. Implementations
    /// should release watches, connections and anything else acquired in
    /// `start`.
    ///
    /// The default implementation returns `Ok(())` for bridges that
    /// don't hold resources.
    async fn stop(&self, _discovery: &dyn ServiceDiscovery) -> Result<(), BridgeError> {
        Ok(())
    }
}
