//! Service usage tracking
//!
//! Consumers that look up a record and start using the service bind to it
//! through the session, and release the binding when done. The session
//! keeps the table of live bindings and broadcasts every bind and every
//! first release on its usage channel, so operators can see who uses what.
//!
//! Releasing a binding twice is harmless: only the first release is
//! announced.

use crate::session::DiscoverySession;
use majakka_core::Record;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Kind of usage event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    Bind,
    Release,
}

impl UsageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UsageKind::Bind => "bind",
            UsageKind::Release => "release",
        }
    }
}

impl fmt::Display for UsageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bind or release, as seen on the usage channel
#[derive(Debug, Clone, Serialize)]
pub struct Usage {
    #[serde(rename = "type")]
    pub kind: UsageKind,
    /// Session the binding lives in
    pub session: String,
    /// Binding id
    pub id: String,
    /// The record bound to
    pub record: Record,
}

/// A consumer's hold on a published record
///
/// The record is a snapshot taken at bind time. Dropping a binding does
/// not release it; call [`Binding::release`].
#[derive(Clone)]
pub struct Binding {
    pub(crate) id: String,
    pub(crate) record: Record,
    pub(crate) session: Arc<DiscoverySession>,
}

impl Binding {
    /// Binding id, unique within the process
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The bound record
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Release the binding
    ///
    /// Returns `false` if it was already released.
    pub fn release(&self) -> bool {
        self.session.release(&self.id)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("record", &self.record.name)
            .field("session", &self.session.name())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::registry::BridgeId;
    use crate::session::DiscoverySession;
    use majakka_core::{BridgeError, Record};
    use std::sync::Arc;
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;

    fn published(session: &Arc<DiscoverySession>) -> Record {
        session
            .publish_as(
                &BridgeId::from("static"),
                Record::http_endpoint("Hello", "acme.org", 80, "/").with_metadata("key", "A"),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_bind_announces_usage() {
        let session = Arc::new(DiscoverySession::new("test"));
        let mut usages = session.subscribe_usage();
        let record = published(&session);

        let binding = session.bind(record.registration.as_deref().unwrap()).unwrap();

        let usage = usages.recv().await.unwrap();
        assert_eq!(usage.kind, UsageKind::Bind);
        assert_eq!(usage.id, binding.id());
        assert!(!usage.id.is_empty());
        assert_eq!(usage.record.endpoint(), Some("http://acme.org:80/"));
        assert_eq!(session.bindings().len(), 1);
        assert_eq!(binding.record().name, "Hello");
    }

    #[tokio::test]
    async fn test_second_release_is_silent() {
        let session = Arc::new(DiscoverySession::new("test"));
        let record = published(&session);
        let binding = session.bind(record.registration.as_deref().unwrap()).unwrap();
        let mut usages = session.subscribe_usage();

        assert!(binding.release());
        assert!(session.bindings().is_empty());

        let usage = usages.recv().await.unwrap();
        assert_eq!(usage.kind, UsageKind::Release);
        assert_eq!(usage.id, binding.id());
        assert_eq!(usage.record.endpoint(), Some("http://acme.org:80/"));

        assert!(!binding.release());
        assert!(session.bindings().is_empty());
        assert!(matches!(usages.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_bind_unknown_registration() {
        let session = Arc::new(DiscoverySession::new("test"));
        let err = session.bind("01HNOPE").unwrap_err();
        assert_eq!(err, BridgeError::NotFound("01HNOPE".to_string()));
        assert!(session.bindings().is_empty());
    }

    #[test]
    fn test_bindings_survive_unpublish() {
        let session = Arc::new(DiscoverySession::new("test"));
        let record = published(&session);
        let registration = record.registration.clone().unwrap();
        let binding = session.bind(&registration).unwrap();

        session
            .unpublish_as(&BridgeId::from("static"), &registration)
            .unwrap();

        assert_eq!(session.bindings().len(), 1);
        assert!(binding.release());
    }

    #[test]
    fn test_usage_serializes_like_an_event() {
        let usage = Usage {
            kind: UsageKind::Bind,
            session: "test".to_string(),
            id: "01HBIND".to_string(),
            record: Record::new("Hello"),
        };
        let json = serde_json::to_value(&usage).unwrap();
        assert_eq!(json["type"], "bind");
        assert_eq!(json["record"]["name"], "Hello");
    }
}
