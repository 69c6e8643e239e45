//! Static bridge
//!
//! Publishes a fixed set of records on start and withdraws them on stop.
//! Records come from the builder and from the `records` array of the
//! bridge's configuration slice:
//!
//! ```json
//! {
//!   "static": {
//!     "records": [
//!       {"name": "billing", "type": "http-endpoint",
//!        "location": {"host": "billing.internal", "port": 8080, "root": "/"}}
//!     ]
//!   }
//! }
//! ```

use async_trait::async_trait;
use majakka_core::{Bridge, BridgeConfig, BridgeError, Record, ServiceDiscovery};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Configuration key holding extra records
pub const RECORDS_KEY: &str = "records";

/// Bridge that publishes a fixed list of records
pub struct StaticBridge {
    name: String,
    records: Vec<Record>,
    /// Registrations handed out by the session, in publication order
    published: Mutex<Vec<String>>,
}

impl StaticBridge {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Add a record to publish on every start
    pub fn with_record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    /// Registrations currently held
    pub fn registrations(&self) -> Vec<String> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl Bridge for StaticBridge {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(
        &self,
        discovery: &dyn ServiceDiscovery,
        config: BridgeConfig,
    ) -> Result<(), BridgeError> {
        let extra: Vec<Record> = config.get_as(RECORDS_KEY)?.unwrap_or_default();

        for record in self.records.iter().cloned().chain(extra) {
            let name = record.name.clone();
            let published = discovery.publish(record).await?;
            let registration = published.registration.ok_or_else(|| {
                BridgeError::Publish(format!("no registration returned for '{name}'"))
            })?;
            debug!(bridge = %self.name, record = %name, %registration, "Static record published");
            self.published.lock().push(registration);
        }

        info!(bridge = %self.name, records = self.published.lock().len(), "Static bridge started");
        Ok(())
    }

    /// Withdraw everything published, including after a partial start
    ///
    /// Records already gone (purged by the coordinator) are skipped. Other
    /// failures don't stop the remaining withdrawals; the first is returned.
    async fn stop(&self, discovery: &dyn ServiceDiscovery) -> Result<(), BridgeError> {
        let registrations = std::mem::take(&mut *self.published.lock());
        let mut first_error = None;

        for registration in registrations {
            match discovery.unpublish(&registration).await {
                Ok(()) | Err(BridgeError::NotFound(_)) => {}
                Err(e) => {
                    warn!(bridge = %self.name, %registration, error = %e, "Failed to withdraw record");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            None => {
                info!(bridge = %self.name, "Static bridge stopped");
                Ok(())
            }
            Some(e) => Err(BridgeError::Shutdown(e.to_string())),
        }
    }
}
