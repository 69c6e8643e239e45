//! Record store
//!
//! Concurrent map of published records, keyed by registration id. Every
//! record remembers the bridge that published it (its owner), so bridges
//! can only take back their own records and the coordinator can clean up
//! after a bridge.
//!
//! # Invariants
//!
//! - Insert, update and remove of a single record are atomic w.r.t. readers
//! - Bridges never block each other beyond the single write lock held for
//!   one record operation
//! - Reads return records in publication order

use crate::registry::BridgeId;
use majakka_core::{BridgeError, Record};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

struct StoredRecord {
    owner: BridgeId,
    seq: u64,
    record: Record,
}

/// Thread-safe store of published records
pub struct RecordStore {
    records: RwLock<HashMap<String, StoredRecord>>,
    /// Publication counter, for stable read order
    seq: AtomicU64,
}

impl RecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// Insert or update a record on behalf of `owner`
    ///
    /// A record without a registration is new and gets a fresh ULID. A
    /// record that carries a registration updates the stored entry in
    /// place; the registration must be in the store and belong to `owner`.
    pub fn insert(&self, owner: &BridgeId, mut record: Record) -> Result<Record, BridgeError> {
        let mut records = self.records.write();

        let (registration, seq) = match record.registration.clone() {
            None => {
                let registration = ulid::Ulid::new().to_string();
                record.registration = Some(registration.clone());
                (registration, self.seq.fetch_add(1, Ordering::Relaxed))
            }
            Some(registration) => match records.get(&registration) {
                None => {
                    return Err(BridgeError::Publish(format!(
                        "unknown registration {registration}; new records must not carry one"
                    )));
                }
                Some(existing) if existing.owner != *owner => {
                    return Err(BridgeError::Publish(format!(
                        "registration {registration} belongs to bridge '{}'",
                        existing.owner
                    )));
                }
                Some(existing) => (registration, existing.seq),
            },
        };

        records.insert(
            registration,
            StoredRecord {
                owner: owner.clone(),
                seq,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    /// Remove a record owned by `owner`
    pub fn remove(&self, owner: &BridgeId, registration: &str) -> Result<Record, BridgeError> {
        let mut records = self.records.write();
        match records.get(registration) {
            Some(stored) if stored.owner == *owner => {}
            _ => return Err(BridgeError::NotFound(registration.to_string())),
        }
        records
            .remove(registration)
            .map(|stored| stored.record)
            .ok_or_else(|| BridgeError::NotFound(registration.to_string()))
    }

    /// Remove every record owned by `owner`, returning them in publication order
    pub fn remove_owned_by(&self, owner: &BridgeId) -> Vec<Record> {
        let mut records = self.records.write();
        let registrations: Vec<String> = records
            .iter()
            .filter(|(_, stored)| stored.owner == *owner)
            .map(|(registration, _)| registration.clone())
            .collect();

        let mut removed: Vec<StoredRecord> = registrations
            .iter()
            .filter_map(|registration| records.remove(registration))
            .collect();
        removed.sort_by_key(|stored| stored.seq);
        removed.into_iter().map(|stored| stored.record).collect()
    }

    /// Look up a record by registration id
    pub fn get(&self, registration: &str) -> Option<Record> {
        self.records
            .read()
            .get(registration)
            .map(|stored| stored.record.clone())
    }

    /// Owner of a registration
    pub fn owner_of(&self, registration: &str) -> Option<BridgeId> {
        self.records
            .read()
            .get(registration)
            .map(|stored| stored.owner.clone())
    }

    /// All records matching `filter`, in publication order
    pub fn find(&self, filter: &Map<String, Value>) -> Vec<Record> {
        self.collect(|stored| stored.record.matches(filter))
    }

    /// First record (in publication order) matching `filter`
    pub fn find_first(&self, filter: &Map<String, Value>) -> Option<Record> {
        self.find(filter).into_iter().next()
    }

    /// All records published by `owner`, in publication order
    pub fn owned_by(&self, owner: &BridgeId) -> Vec<Record> {
        self.collect(|stored| stored.owner == *owner)
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn collect(&self, keep: impl Fn(&StoredRecord) -> bool) -> Vec<Record> {
        let records = self.records.read();
        let mut matched: Vec<&StoredRecord> = records.values().filter(|s| keep(s)).collect();
        matched.sort_by_key(|stored| stored.seq);
        matched.into_iter().map(|stored| stored.record.clone()).collect()
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}
