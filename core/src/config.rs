//! Bridge configuration document

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Immutable key/value configuration handed to a bridge at start
///
/// A thin wrapper around a JSON object. An absent configuration is the
/// empty document. Bridges receive it by value for the duration of `start`
/// and read what they need out of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BridgeConfig(Map<String, Value>);

impl BridgeConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert, mostly useful in tests and demos
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Raw value for a key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value for a key, `None` if absent or not a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Unsigned integer value for a key, `None` if absent or not a u64
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    /// Boolean value for a key, `None` if absent or not a bool
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// String value that must be present
    pub fn require_str(&self, key: &str) -> Result<&str, BridgeError> {
        self.get_str(key)
            .ok_or_else(|| BridgeError::Config(format!("missing string key '{key}'")))
    }

    /// Deserialize the value under `key` into `T`
    ///
    /// Returns `Ok(None)` when the key is absent.
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, BridgeError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| BridgeError::Config(format!("key '{key}': {e}"))),
        }
    }

    /// Whether the key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Whether the document has no keys
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of top-level keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Borrow the underlying JSON object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for BridgeConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for BridgeConfig {
    type Error = BridgeError;

    /// Only JSON objects and `null` are valid documents; `null` is empty
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(BridgeError::Config(format!(
                "bridge configuration must be an object, got {other}"
            ))),
        }
    }
}
