//! Bridge registry
//!
//! Holds the bridges registered with a coordinator together with their
//! lifecycle state. Bridges are kept in registration order, which is the
//! order the coordinator initiates `start` and `stop` in and the order
//! reports are written in.
//!
//! # Invariants
//!
//! - A bridge instance is registered at most once, and names are unique
//! - Only `Idle` or `Stopped` bridges can be unregistered
//! - State changes go through [`BridgeRegistry::transition`], which rejects
//!   anything [`BridgeState::can_transition_to`] doesn't allow

use crate::error::{DiscoveryError, Result};
use crate::metrics::Metrics;
use crate::state::BridgeState;
use majakka_core::Bridge;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Identity of a registered bridge (its name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BridgeId(String);

impl BridgeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BridgeId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for BridgeId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for BridgeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A bridge and its lifecycle bookkeeping
pub struct RegisteredBridge {
    id: BridgeId,
    bridge: Arc<dyn Bridge>,
    state: BridgeState,
    last_error: Option<String>,
}

impl RegisteredBridge {
    pub fn id(&self) -> &BridgeId {
        &self.id
    }

    pub fn bridge(&self) -> &Arc<dyn Bridge> {
        &self.bridge
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Message of the most recent failure, cleared when the bridge starts again
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl fmt::Debug for RegisteredBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredBridge")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("last_error", &self.last_error)
            .finish()
    }
}

/// Registry of bridges in registration order
pub struct BridgeRegistry {
    bridges: Vec<RegisteredBridge>,
}

impl BridgeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            bridges: Vec::new(),
        }
    }

    /// Register a bridge in `Idle` state
    ///
    /// Fails with `AlreadyRegistered` if this exact instance, or another
    /// bridge with the same name, is already registered.
    pub fn register(&mut self, bridge: Arc<dyn Bridge>) -> Result<BridgeId> {
        let id = BridgeId::from(bridge.name());

        let duplicate = self
            .bridges
            .iter()
            .any(|entry| same_instance(&entry.bridge, &bridge) || entry.id == id);
        if duplicate {
            return Err(DiscoveryError::AlreadyRegistered(id));
        }

        info!(bridge = %id, position = self.bridges.len(), "Registered bridge");
        if let Some(metrics) = Metrics::get() {
            metrics.set_bridge_state(id.as_str(), BridgeState::Idle);
        }
        self.bridges.push(RegisteredBridge {
            id: id.clone(),
            bridge,
            state: BridgeState::Idle,
            last_error: None,
        });
        Ok(id)
    }

    /// Remove a bridge that is `Idle` or `Stopped`
    pub fn unregister(&mut self, id: &BridgeId) -> Result<Arc<dyn Bridge>> {
        let position = self.position(id)?;
        let state = self.bridges[position].state;
        if !state.is_detachable() {
            return Err(DiscoveryError::invalid_state(
                format!("bridge '{id}'"),
                state,
                "unregister",
            ));
        }

        let entry = self.bridges.remove(position);
        info!(bridge = %id, "Unregistered bridge");
        if let Some(metrics) = Metrics::get() {
            metrics.remove_bridge(id.as_str());
        }
        Ok(entry.bridge)
    }

    /// Registered bridges in registration order
    ///
    /// The iterator is lazy and cloneable; call again (or clone it) to
    /// walk the bridges another time.
    pub fn list(&self) -> std::slice::Iter<'_, RegisteredBridge> {
        self.bridges.iter()
    }

    /// Look up a bridge
    pub fn get(&self, id: &BridgeId) -> Option<&RegisteredBridge> {
        self.bridges.iter().find(|entry| entry.id == *id)
    }

    /// Current state of a bridge
    pub fn state(&self, id: &BridgeId) -> Option<BridgeState> {
        self.get(id).map(RegisteredBridge::state)
    }

    /// Whether a bridge with this identity is registered
    pub fn contains(&self, id: &BridgeId) -> bool {
        self.get(id).is_some()
    }

    /// Identities of all bridges, in registration order
    pub fn ids(&self) -> Vec<BridgeId> {
        self.ids_where(|_| true)
    }

    /// Identities of bridges currently in `state`, in registration order
    pub fn in_state(&self, state: BridgeState) -> Vec<BridgeId> {
        self.ids_where(|current| current == state)
    }

    /// Identities of bridges whose state satisfies `predicate`, in registration order
    pub fn ids_where(&self, predicate: impl Fn(BridgeState) -> bool) -> Vec<BridgeId> {
        self.bridges
            .iter()
            .filter(|entry| predicate(entry.state))
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Move a bridge to `next`, returning the previous state
    pub fn transition(&mut self, id: &BridgeId, next: BridgeState) -> Result<BridgeState> {
        let position = self.position(id)?;
        let entry = &mut self.bridges[position];
        let previous = entry.state;
        if !previous.can_transition_to(next) {
            return Err(DiscoveryError::invalid_state(
                format!("bridge '{id}'"),
                previous,
                transition_name(next),
            ));
        }

        entry.state = next;
        if next == BridgeState::Starting {
            entry.last_error = None;
        }
        debug!(bridge = %id, from = %previous, to = %next, "Bridge state changed");
        if let Some(metrics) = Metrics::get() {
            metrics.set_bridge_state(id.as_str(), next);
        }
        Ok(previous)
    }

    /// Mark a bridge `Failed` and remember why
    pub fn fail(&mut self, id: &BridgeId, message: impl Into<String>) -> Result<BridgeState> {
        let previous = self.transition(id, BridgeState::Failed)?;
        if let Some(entry) = self.bridges.iter_mut().find(|entry| entry.id == *id) {
            entry.last_error = Some(message.into());
        }
        Ok(previous)
    }

    /// Get the number of registered bridges
    pub fn len(&self) -> usize {
        self.bridges.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.bridges.is_empty()
    }

    fn position(&self, id: &BridgeId) -> Result<usize> {
        self.bridges
            .iter()
            .position(|entry| entry.id == *id)
            .ok_or_else(|| DiscoveryError::NotRegistered(id.clone()))
    }
}

impl Default for BridgeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Pointer identity of two bridge trait objects, ignoring vtables
fn same_instance(a: &Arc<dyn Bridge>, b: &Arc<dyn Bridge>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

fn transition_name(next: BridgeState) -> &'static str {
    match next {
        BridgeState::Idle => "reset",
        BridgeState::Starting => "start",
        BridgeState::Running => "mark running",
        BridgeState::Stopping => "stop",
        BridgeState::Stopped => "mark stopped",
        BridgeState::Failed => "fail",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use majakka_core::{BridgeConfig, BridgeError, ServiceDiscovery};

    struct NamedBridge(&'static str);

    #[async_trait]
    impl Bridge for NamedBridge {
        fn name(&self) -> &str {
            self.0
        }

        async fn start(
            &self,
            _discovery: &dyn ServiceDiscovery,
            _config: BridgeConfig,
        ) -> std::result::Result<(), BridgeError> {
            Ok(())
        }
    }

    fn bridge(name: &'static str) -> Arc<dyn Bridge> {
        Arc::new(NamedBridge(name))
    }

    fn names(registry: &BridgeRegistry) -> Vec<&str> {
        registry.list().map(|entry| entry.id().as_str()).collect()
    }

    #[test]
    fn test_register_starts_idle() {
        let mut registry = BridgeRegistry::new();
        let id = registry.register(bridge("dns")).unwrap();

        assert_eq!(id, BridgeId::from("dns"));
        assert_eq!(registry.state(&id), Some(BridgeState::Idle));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_same_instance_twice() {
        let mut registry = BridgeRegistry::new();
        let dns = bridge("dns");
        registry.register(Arc::clone(&dns)).unwrap();

        let err = registry.register(dns).unwrap_err();
        assert!(matches!(err, DiscoveryError::AlreadyRegistered(id) if id.as_str() == "dns"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_duplicate_name() {
        let mut registry = BridgeRegistry::new();
        registry.register(bridge("dns")).unwrap();
        assert!(matches!(
            registry.register(bridge("dns")),
            Err(DiscoveryError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_list_preserves_registration_order() {
        let mut registry = BridgeRegistry::new();
        for name in ["a", "b", "c", "d", "e"] {
            registry.register(bridge(name)).unwrap();
        }
        registry.unregister(&BridgeId::from("b")).unwrap();
        registry.unregister(&BridgeId::from("d")).unwrap();
        registry.register(bridge("f")).unwrap();

        assert_eq!(names(&registry), vec!["a", "c", "e", "f"]);
    }

    #[test]
    fn test_list_is_restartable() {
        let mut registry = BridgeRegistry::new();
        registry.register(bridge("a")).unwrap();
        registry.register(bridge("b")).unwrap();

        let iter = registry.list();
        let first: Vec<_> = iter.clone().map(|e| e.id().clone()).collect();
        let second: Vec<_> = iter.map(|e| e.id().clone()).collect();
        assert_eq!(first, second);
        assert_eq!(registry.list().count(), 2);
    }

    #[test]
    fn test_unregister_unknown() {
        let mut registry = BridgeRegistry::new();
        assert!(matches!(
            registry.unregister(&BridgeId::from("ghost")),
            Err(DiscoveryError::NotRegistered(_))
        ));
    }

    #[test]
    fn test_unregister_running_bridge_rejected() {
        let mut registry = BridgeRegistry::new();
        let id = registry.register(bridge("dns")).unwrap();
        registry.transition(&id, BridgeState::Starting).unwrap();
        registry.transition(&id, BridgeState::Running).unwrap();

        let err = registry.unregister(&id).err().unwrap();
        assert!(matches!(err, DiscoveryError::InvalidState { .. }));
        assert!(registry.contains(&id));
    }

    #[test]
    fn test_unregister_stopped_bridge() {
        let mut registry = BridgeRegistry::new();
        let id = registry.register(bridge("dns")).unwrap();
        for next in [
            BridgeState::Starting,
            BridgeState::Running,
            BridgeState::Stopping,
            BridgeState::Stopped,
        ] {
            registry.transition(&id, next).unwrap();
        }

        assert!(registry.unregister(&id).is_ok());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_illegal_transition_leaves_state() {
        let mut registry = BridgeRegistry::new();
        let id = registry.register(bridge("dns")).unwrap();

        let err = registry.transition(&id, BridgeState::Running).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot mark running bridge 'dns' while it is idle"
        );
        assert_eq!(registry.state(&id), Some(BridgeState::Idle));
    }

    #[test]
    fn test_fail_records_message_and_restart_clears_it() {
        let mut registry = BridgeRegistry::new();
        let id = registry.register(bridge("dns")).unwrap();
        registry.transition(&id, BridgeState::Starting).unwrap();
        registry.fail(&id, "connection refused").unwrap();

        assert_eq!(registry.state(&id), Some(BridgeState::Failed));
        assert_eq!(
            registry.get(&id).unwrap().last_error(),
            Some("connection refused")
        );

        registry.transition(&id, BridgeState::Stopping).unwrap();
        registry.transition(&id, BridgeState::Stopped).unwrap();
        registry.transition(&id, BridgeState::Starting).unwrap();
        assert_eq!(registry.get(&id).unwrap().last_error(), None);
    }

    #[test]
    fn test_ids_where() {
        let mut registry = BridgeRegistry::new();
        let a = registry.register(bridge("a")).unwrap();
        registry.register(bridge("b")).unwrap();
        registry.transition(&a, BridgeState::Starting).unwrap();

        assert_eq!(
            registry.ids_where(BridgeState::is_startable),
            vec![BridgeId::from("b")]
        );
        assert_eq!(registry.in_state(BridgeState::Starting), vec![a.clone()]);
        assert_eq!(registry.ids(), vec![a, BridgeId::from("b")]);
    }
}
