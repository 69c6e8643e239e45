//! Discovery session
//!
//! The shared context every bridge publishes into. It owns the
//! [`RecordStore`] and an announce channel on which every publication
//! (status `UP`) and removal (status `DOWN`) is broadcast.
//!
//! Bridges never see the session directly. The coordinator hands each one a
//! [`BridgeHandle`], a [`ServiceDiscovery`] implementation scoped to that
//! bridge's identity.
//!
//! Consumers of the published services record their usage through
//! [`DiscoverySession::bind`], see [`crate::usage`].
//!
//! ```text
//! Bridge A ──► BridgeHandle(A) ──┐
//!                                ├──► RecordStore ──► announcements
//! Bridge B ──► BridgeHandle(B) ──┘
//! ```

use crate::metrics::Metrics;
use crate::registry::BridgeId;
use crate::store::RecordStore;
use crate::usage::{Binding, Usage, UsageKind};
use async_trait::async_trait;
use majakka_core::{BridgeError, Record, ServiceDiscovery, Status};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default announce channel capacity
pub const DEFAULT_ANNOUNCE_CAPACITY: usize = 1024;

/// A record published or withdrawn, as seen on the announce channel
#[derive(Debug, Clone)]
pub struct Announcement {
    /// Bridge that published the record
    pub owner: BridgeId,
    /// The record; `status` is `DOWN` for withdrawals
    pub record: Record,
}

/// Shared discovery context and record store
///
/// The `majakka_records_published` gauge is labelled with the session
/// name; give concurrent sessions distinct names.
pub struct DiscoverySession {
    name: String,
    store: RecordStore,
    announcer: broadcast::Sender<Announcement>,
    /// Live bindings (id, record), in bind order
    bindings: RwLock<Vec<(String, Record)>>,
    usage: broadcast::Sender<Usage>,
}

impl DiscoverySession {
    /// Create a session with the default announce capacity
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_ANNOUNCE_CAPACITY)
    }

    /// Create a session with a custom announce channel capacity
    ///
    /// Slow subscribers that fall more than `capacity` announcements behind
    /// skip ahead (they see a `Lagged` error), publishers never block.
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        let (announcer, _) = broadcast::channel(capacity.max(1));
        let (usage, _) = broadcast::channel(capacity.max(1));
        Self {
            name: name.into(),
            store: RecordStore::new(),
            announcer,
            bindings: RwLock::new(Vec::new()),
            usage,
        }
    }

    /// Session name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish a record on behalf of `owner`
    ///
    /// Assigns a registration if the record has none. A record that carries
    /// one updates the published record, which must exist and belong to
    /// `owner`. A record published with status `UNKNOWN` is stored as `UP`.
    pub fn publish_as(&self, owner: &BridgeId, mut record: Record) -> Result<Record, BridgeError> {
        if record.status == Status::Unknown {
            record.status = Status::Up;
        }
        let record = self.store.insert(owner, record)?;
        debug!(
            session = %self.name,
            bridge = %owner,
            name = %record.name,
            registration = ?record.registration,
            "Record published"
        );
        self.announce(owner, record.clone());
        self.update_gauge();
        Ok(record)
    }

    /// Withdraw a record published by `owner`
    ///
    /// The removed record is announced with status `DOWN`.
    pub fn unpublish_as(&self, owner: &BridgeId, registration: &str) -> Result<Record, BridgeError> {
        let record = self.store.remove(owner, registration)?;
        debug!(
            session = %self.name,
            bridge = %owner,
            name = %record.name,
            registration = %registration,
            "Record unpublished"
        );
        self.announce(owner, record.clone().with_status(Status::Down));
        self.update_gauge();
        Ok(record)
    }

    /// First record matching `filter`
    pub fn get_record(&self, filter: &Map<String, Value>) -> Option<Record> {
        self.store.find_first(filter)
    }

    /// All records matching `filter`
    pub fn get_records(&self, filter: &Map<String, Value>) -> Vec<Record> {
        self.store.find(filter)
    }

    /// Records published by one bridge
    pub fn records_of(&self, owner: &BridgeId) -> Vec<Record> {
        self.store.owned_by(owner)
    }

    /// Withdraw everything a bridge published; returns how many records went
    pub fn remove_records_of(&self, owner: &BridgeId) -> usize {
        let removed = self.store.remove_owned_by(owner);
        let count = removed.len();
        for record in removed {
            self.announce(owner, record.with_status(Status::Down));
        }
        if count > 0 {
            debug!(session = %self.name, bridge = %owner, count, "Records purged");
            self.update_gauge();
        }
        count
    }

    /// Number of records in the store
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Subscribe to publications and withdrawals
    pub fn subscribe(&self) -> broadcast::Receiver<Announcement> {
        self.announcer.subscribe()
    }

    /// Subscribe to binds and releases
    pub fn subscribe_usage(&self) -> broadcast::Receiver<Usage> {
        self.usage.subscribe()
    }

    /// Bind to a published record
    ///
    /// Fails with [`BridgeError::NotFound`] if nothing is published under
    /// `registration`.
    pub fn bind(self: &Arc<Self>, registration: &str) -> Result<Binding, BridgeError> {
        let record = self
            .store
            .get(registration)
            .ok_or_else(|| BridgeError::NotFound(registration.to_string()))?;
        let id = ulid::Ulid::new().to_string();

        self.bindings.write().push((id.clone(), record.clone()));
        debug!(session = %self.name, binding = %id, name = %record.name, "Record bound");
        self.notify_usage(UsageKind::Bind, &id, record.clone());

        Ok(Binding {
            id,
            record,
            session: Arc::clone(self),
        })
    }

    /// Release a binding by id
    ///
    /// Returns `false`, and announces nothing, if it was already released.
    pub fn release(&self, binding: &str) -> bool {
        let released = {
            let mut bindings = self.bindings.write();
            let index = bindings.iter().position(|(id, _)| id == binding);
            index.map(|index| bindings.remove(index))
        };

        match released {
            Some((id, record)) => {
                debug!(session = %self.name, binding = %id, name = %record.name, "Binding released");
                self.notify_usage(UsageKind::Release, &id, record);
                true
            }
            None => false,
        }
    }

    /// Live bindings, in bind order
    pub fn bindings(self: &Arc<Self>) -> Vec<Binding> {
        self.bindings
            .read()
            .iter()
            .map(|(id, record)| Binding {
                id: id.clone(),
                record: record.clone(),
                session: Arc::clone(self),
            })
            .collect()
    }

    /// Publishing handle scoped to one bridge
    pub fn handle(self: &Arc<Self>, owner: BridgeId) -> BridgeHandle {
        BridgeHandle {
            session: Arc::clone(self),
            owner,
            retired: Arc::new(AtomicBool::new(false)),
        }
    }

    fn announce(&self, owner: &BridgeId, record: Record) {
        // No subscribers is fine
        let _ = self.announcer.send(Announcement {
            owner: owner.clone(),
            record,
        });
    }

    fn notify_usage(&self, kind: UsageKind, id: &str, record: Record) {
        // No subscribers is fine
        let _ = self.usage.send(Usage {
            kind,
            session: self.name.clone(),
            id: id.to_string(),
            record,
        });
    }

    fn update_gauge(&self) {
        if let Some(metrics) = Metrics::get() {
            metrics.set_records_published(&self.name, self.store.len());
        }
    }
}

impl Drop for DiscoverySession {
    fn drop(&mut self) {
        if let Some(metrics) = Metrics::get() {
            metrics.remove_session(&self.name);
        }
    }
}

/// [`ServiceDiscovery`] scoped to a single bridge
///
/// Everything published through the handle is owned by that bridge, and
/// only that bridge's records can be unpublished through it.
///
/// Once retired, a handle refuses to publish (`BridgeError::Shutdown`) but
/// still unpublishes. Clones share the retired flag.
#[derive(Clone)]
pub struct BridgeHandle {
    session: Arc<DiscoverySession>,
    owner: BridgeId,
    retired: Arc<AtomicBool>,
}

impl BridgeHandle {
    /// Stop accepting publications through this handle
    pub fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    /// Whether [`retire`](Self::retire) was called
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Identity the handle publishes as
    pub fn owner(&self) -> &BridgeId {
        &self.owner
    }

    /// The underlying session
    pub fn session(&self) -> &Arc<DiscoverySession> {
        &self.session
    }
}

#[async_trait]
impl ServiceDiscovery for BridgeHandle {
    async fn publish(&self, record: Record) -> Result<Record, BridgeError> {
        if self.is_retired() {
            warn!(bridge = %self.owner, name = %record.name, "Publication after the bridge call was given up");
            return Err(BridgeError::Shutdown(format!(
                "bridge '{}' can no longer publish: its call timed out",
                self.owner
            )));
        }
        self.session.publish_as(&self.owner, record)
    }

    async fn unpublish(&self, registration: &str) -> Result<(), BridgeError> {
        self.session
            .unpublish_as(&self.owner, registration)
            .map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_publish_and_lookup_through_handle() {
        let session = Arc::new(DiscoverySession::new("test"));
        let handle = session.handle(BridgeId::from("static"));

        let record = handle
            .publish(Record::http_endpoint("Hello", "acme.org", 80, "/"))
            .await
            .unwrap();
        assert!(record.registration.is_some());
        assert_eq!(record.status, Status::Up);

        let found = session.get_record(&filter(json!({"name": "Hello"}))).unwrap();
        assert_eq!(found.endpoint(), Some("http://acme.org:80/"));
    }

    #[tokio::test]
    async fn test_unpublish_removes_record() {
        let session = Arc::new(DiscoverySession::new("test"));
        let handle = session.handle(BridgeId::from("static"));

        let record = handle.publish(Record::new("Hello")).await.unwrap();
        handle
            .unpublish(record.registration.as_deref().unwrap())
            .await
            .unwrap();

        assert!(session.get_record(&filter(json!({"name": "Hello"}))).is_none());
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_handle_cannot_unpublish_foreign_record() {
        let session = Arc::new(DiscoverySession::new("test"));
        let a = session.handle(BridgeId::from("a"));
        let b = session.handle(BridgeId::from("b"));

        let record = a.publish(Record::new("owned-by-a")).await.unwrap();
        let registration = record.registration.unwrap();

        let result = b.unpublish(&registration).await;
        assert_eq!(result, Err(BridgeError::NotFound(registration)));
        assert_eq!(session.len(), 1);
    }

    #[tokio::test]
    async fn test_announcements_up_then_down() {
        let session = Arc::new(DiscoverySession::new("test"));
        let mut announcements = session.subscribe();
        let handle = session.handle(BridgeId::from("static"));

        let r1 = handle.publish(Record::new("Hello")).await.unwrap();
        handle.publish(Record::new("Hello-2")).await.unwrap();
        handle
            .unpublish(r1.registration.as_deref().unwrap())
            .await
            .unwrap();

        let first = announcements.recv().await.unwrap();
        let second = announcements.recv().await.unwrap();
        let third = announcements.recv().await.unwrap();

        assert_eq!(first.record.status, Status::Up);
        assert_eq!(second.record.status, Status::Up);
        assert_eq!(third.record.status, Status::Down);
        assert_eq!(third.record.name, "Hello");
        assert_eq!(third.owner, BridgeId::from("static"));
    }

    #[tokio::test]
    async fn test_remove_records_of() {
        let session = Arc::new(DiscoverySession::new("test"));
        let a = BridgeId::from("a");
        session.publish_as(&a, Record::new("a1")).unwrap();
        session.publish_as(&a, Record::new("a2")).unwrap();
        session.publish_as(&BridgeId::from("b"), Record::new("b1")).unwrap();

        assert_eq!(session.records_of(&a).len(), 2);
        assert_eq!(session.remove_records_of(&a), 2);
        assert_eq!(session.remove_records_of(&a), 0);
        assert_eq!(session.get_records(&Map::new()).len(), 1);
    }

    #[tokio::test]
    async fn test_retired_handle_only_unpublishes() {
        let session = Arc::new(DiscoverySession::new("test"));
        let handle = session.handle(BridgeId::from("static"));
        let record = handle.publish(Record::new("early")).await.unwrap();

        let clone = handle.clone();
        handle.retire();
        assert!(clone.is_retired());

        let err = clone.publish(Record::new("late")).await.unwrap_err();
        assert!(matches!(err, BridgeError::Shutdown(_)));
        assert_eq!(session.len(), 1);

        clone
            .unpublish(record.registration.as_deref().unwrap())
            .await
            .unwrap();
        assert!(session.is_empty());

        // A fresh handle for the same bridge publishes again
        let fresh = session.handle(BridgeId::from("static"));
        assert!(fresh.publish(Record::new("again")).await.is_ok());
    }

    #[test]
    fn test_update_needs_existing_registration() {
        let session = DiscoverySession::new("test");
        let owner = BridgeId::from("a");
        let record = session.publish_as(&owner, Record::new("x")).unwrap();
        let registration = record.registration.clone().unwrap();

        let updated = session
            .publish_as(&owner, record.clone().with_metadata("zone", "eu"))
            .unwrap();
        assert_eq!(updated.registration.as_deref(), Some(registration.as_str()));
        assert_eq!(session.len(), 1);

        session.unpublish_as(&owner, &registration).unwrap();
        let result = session.publish_as(&owner, record);
        assert!(matches!(result, Err(BridgeError::Publish(_))));
        assert!(session.is_empty());
    }

    #[test]
    fn test_explicit_status_kept() {
        let session = DiscoverySession::new("test");
        let record = session
            .publish_as(
                &BridgeId::from("a"),
                Record::new("maintenance").with_status(Status::OutOfService),
            )
            .unwrap();
        assert_eq!(record.status, Status::OutOfService);
    }
}
