//! Service record - the unit bridges publish into a discovery session
//!
//! A record describes one discovered service: its name, its type (which
//! tells a consumer how to read `location`), where it lives, free-form
//! metadata, and its availability status. The store assigns a
//! `registration` id when the record is published.
//!
//! JSON field names follow the wire shape consumers of discovery data
//! already expect (`name`, `type`, `location`, `metadata`, `status`,
//! `registration`).

use crate::location::HttpLocation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Record type for services without a specific type
pub const TYPE_UNKNOWN: &str = "unknown";

/// Key of the endpoint URL inside `location`
pub const ENDPOINT: &str = "endpoint";

/// Filter value meaning "the key must be present, any value"
pub const WILDCARD: &str = "*";

/// Availability status of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Service is available
    Up,
    /// Service has gone away (sent when a record is unpublished)
    Down,
    /// Service exists but should not be used
    OutOfService,
    /// Status not known yet
    #[default]
    Unknown,
}

impl Status {
    /// Wire name of the status, as it appears in JSON and filters
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Up => "UP",
            Status::Down => "DOWN",
            Status::OutOfService => "OUT_OF_SERVICE",
            Status::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published (or to-be-published) service description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Service name
    pub name: String,
    /// Service type, e.g. `http-endpoint`, `grpc`
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    /// Type-specific location document
    #[serde(default)]
    pub location: Map<String, Value>,
    /// Free-form metadata, searchable through filters
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Availability status
    #[serde(default)]
    pub status: Status,
    /// Registration id, assigned by the store on publish
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<String>,
}

fn default_type() -> String {
    TYPE_UNKNOWN.to_string()
}

impl Record {
    /// Create a record with the given name and no location
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: default_type(),
            location: Map::new(),
            metadata: Map::new(),
            status: Status::Unknown,
            registration: None,
        }
    }

    /// Create an `http-endpoint` record
    ///
    /// The location carries host/port/root/ssl and a computed `endpoint`
    /// URL, so consumers that only care about the URL can read that.
    ///
    /// ```
    /// use majakka_core::Record;
    ///
    /// let record = Record::http_endpoint("static-record-1", "acme.org", 80, "/");
    /// assert_eq!(record.endpoint(), Some("http://acme.org:80/"));
    /// ```
    pub fn http_endpoint(name: impl Into<String>, host: &str, port: u16, root: &str) -> Self {
        let location = HttpLocation::new(host, port, root);
        Self::new(name)
            .with_kind(HttpLocation::TYPE)
            .with_location(location.to_json())
    }

    /// Set the record type
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Replace the location document
    pub fn with_location(mut self, location: Map<String, Value>) -> Self {
        self.location = location;
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the status
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// The `endpoint` entry of the location, if it's a string
    pub fn endpoint(&self) -> Option<&str> {
        self.location.get(ENDPOINT).and_then(Value::as_str)
    }

    /// Check the record against a filter document
    ///
    /// Every entry of the filter must match. `name`, `type`, `status` and
    /// `registration` compare against the record fields; other keys are
    /// looked up in `metadata`. A filter value of `"*"` only requires the
    /// key to be present. An empty filter matches every record.
    pub fn matches(&self, filter: &Map<String, Value>) -> bool {
        filter.iter().all(|(key, expected)| {
            let actual = match key.as_str() {
                "name" => Some(Value::String(self.name.clone())),
                "type" => Some(Value::String(self.kind.clone())),
                "status" => Some(Value::String(self.status.as_str().to_string())),
                "registration" => self.registration.clone().map(Value::String),
                _ => self.metadata.get(key).cloned(),
            };
            match (actual, expected) {
                (None, _) => false,
                (Some(_), Value::String(s)) if s == WILDCARD => true,
                (Some(actual), expected) => &actual == expected,
            }
        })
    }
}
