//! Typed record locations
//!
//! A record's `location` is a JSON object whose shape depends on the record
//! type. These types give bridges a typed way to build and read the common
//! ones. Conversion from JSON is lenient: a field is copied only when it has
//! the expected JSON type, anything else keeps its default.

use serde_json::{Map, Value};

/// Location of an HTTP endpoint (`http-endpoint` records)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpLocation {
    /// Host name or address
    pub host: String,
    /// Port
    pub port: u16,
    /// Path prefix, always starting with `/`
    pub root: String,
    /// Whether the endpoint uses TLS
    pub ssl: bool,
}

impl HttpLocation {
    /// Record type for HTTP endpoints
    pub const TYPE: &'static str = "http-endpoint";

    /// Create a plain-HTTP location
    pub fn new(host: impl Into<String>, port: u16, root: &str) -> Self {
        let root = if root.starts_with('/') {
            root.to_string()
        } else {
            format!("/{root}")
        };
        Self {
            host: host.into(),
            port,
            root,
            ssl: false,
        }
    }

    /// Switch to HTTPS
    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// Endpoint URL built from the parts
    pub fn endpoint(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{scheme}://{}:{}{}", self.host, self.port, self.root)
    }

    /// Read a location document
    pub fn from_json(json: &Map<String, Value>) -> Self {
        let mut location = Self::new("", 80, "/");
        if let Some(host) = json.get("host").and_then(Value::as_str) {
            location.host = host.to_string();
        }
        if let Some(port) = json.get("port").and_then(as_port) {
            location.port = port;
        }
        if let Some(root) = json.get("root").and_then(Value::as_str) {
            location.root = root.to_string();
        }
        if let Some(ssl) = json.get("ssl").and_then(Value::as_bool) {
            location.ssl = ssl;
        }
        location
    }

    /// Write the location document, including the computed `endpoint`
    pub fn to_json(&self) -> Map<String, Value> {
        let mut json = Map::new();
        json.insert("host".into(), Value::String(self.host.clone()));
        json.insert("port".into(), Value::from(self.port));
        json.insert("root".into(), Value::String(self.root.clone()));
        json.insert("ssl".into(), Value::Bool(self.ssl));
        json.insert(crate::record::ENDPOINT.into(), Value::String(self.endpoint()));
        json
    }
}

/// Location of a gRPC service (`grpc` records)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrpcLocation {
    /// Full endpoint, if the bridge knows one
    pub endpoint: Option<String>,
    /// Host name or address
    pub host: Option<String>,
    /// Port
    pub port: u16,
    /// Whether the channel uses TLS
    pub ssl: bool,
}

impl GrpcLocation {
    /// Record type for gRPC services
    pub const TYPE: &'static str = "grpc";

    /// Read a location document
    pub fn from_json(json: &Map<String, Value>) -> Self {
        let mut location = Self::default();
        if let Some(endpoint) = json.get("endpoint").and_then(Value::as_str) {
            location.endpoint = Some(endpoint.to_string());
        }
        if let Some(host) = json.get("host").and_then(Value::as_str) {
            location.host = Some(host.to_string());
        }
        if let Some(port) = json.get("port").and_then(as_port) {
            location.port = port;
        }
        if let Some(ssl) = json.get("ssl").and_then(Value::as_bool) {
            location.ssl = ssl;
        }
        location
    }

    /// Write the location document
    ///
    /// `endpoint` and `host` are omitted when unset; `port` and `ssl` are
    /// always written.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut json = Map::new();
        if let Some(endpoint) = &self.endpoint {
            json.insert("endpoint".into(), Value::String(endpoint.clone()));
        }
        if let Some(host) = &self.host {
            json.insert("host".into(), Value::String(host.clone()));
        }
        json.insert("port".into(), Value::from(self.port));
        json.insert("ssl".into(), Value::Bool(self.ssl));
        json
    }
}

fn as_port(value: &Value) -> Option<u16> {
    value.as_u64().and_then(|p| u16::try_from(p).ok())
}
