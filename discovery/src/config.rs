//! Configuration
//!
//! Process settings come from `MAJAKKA_*` environment variables
//! ([`Config::from_env`]). Per-bridge settings come from a JSON document
//! mapping bridge identity to a JSON object ([`BridgeConfigs`]).

use crate::error::{DiscoveryError, Result};
use crate::registry::BridgeId;
use crate::session::DEFAULT_ANNOUNCE_CAPACITY;
use majakka_core::BridgeConfig;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(DiscoveryError::Config(format!(
                "unknown log format '{other}' (expected 'json' or 'pretty')"
            ))),
        }
    }
}

/// Process configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Discovery session name
    pub session_name: String,
    /// Default tracing filter (`RUST_LOG` wins when set)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Metrics HTTP listen address
    pub metrics_addr: SocketAddr,
    /// Barrier timeout for `start_all`, `None` waits forever
    pub start_timeout: Option<Duration>,
    /// Barrier timeout for `stop_all`, `None` waits forever
    pub stop_timeout: Option<Duration>,
    /// Per-bridge JSON document
    pub bridge_config_path: Option<PathBuf>,
    /// Remove a bridge's records once it has stopped
    pub purge_on_stop: bool,
    /// Announce broadcast buffer
    pub announce_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_name: "majakka".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            start_timeout: Some(Duration::from_millis(30_000)),
            stop_timeout: Some(Duration::from_millis(10_000)),
            bridge_config_path: None,
            purge_on_stop: false,
            announce_capacity: DEFAULT_ANNOUNCE_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration from `MAJAKKA_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    ///
    /// Unset variables keep their defaults. Values that don't parse are a
    /// `Config` error naming the variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(name) = lookup("MAJAKKA_SESSION_NAME") {
            config.session_name = name;
        }
        if let Some(level) = lookup("MAJAKKA_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(format) = lookup("MAJAKKA_LOG_FORMAT") {
            config.log_format = format.parse()?;
        }
        if let Some(addr) = lookup("MAJAKKA_METRICS_ADDR") {
            config.metrics_addr = parse_var("MAJAKKA_METRICS_ADDR", &addr)?;
        }
        if let Some(ms) = lookup("MAJAKKA_START_TIMEOUT_MS") {
            config.start_timeout = timeout_from_ms(parse_var("MAJAKKA_START_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = lookup("MAJAKKA_STOP_TIMEOUT_MS") {
            config.stop_timeout = timeout_from_ms(parse_var("MAJAKKA_STOP_TIMEOUT_MS", &ms)?);
        }
        if let Some(path) = lookup("MAJAKKA_BRIDGE_CONFIG") {
            if !path.is_empty() {
                config.bridge_config_path = Some(PathBuf::from(path));
            }
        }
        if let Some(purge) = lookup("MAJAKKA_PURGE_ON_STOP") {
            config.purge_on_stop = parse_var("MAJAKKA_PURGE_ON_STOP", &purge)?;
        }
        if let Some(capacity) = lookup("MAJAKKA_ANNOUNCE_CAPACITY") {
            let capacity: usize = parse_var("MAJAKKA_ANNOUNCE_CAPACITY", &capacity)?;
            if capacity == 0 {
                return Err(DiscoveryError::Config(
                    "MAJAKKA_ANNOUNCE_CAPACITY must be greater than 0".to_string(),
                ));
            }
            config.announce_capacity = capacity;
        }

        Ok(config)
    }

    /// Per-bridge configuration from `bridge_config_path`, empty if unset
    pub fn bridge_configs(&self) -> Result<BridgeConfigs> {
        match &self.bridge_config_path {
            Some(path) => BridgeConfigs::load(path),
            None => Ok(BridgeConfigs::new()),
        }
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DiscoveryError::Config(format!("invalid value '{value}' for {key}")))
}

fn timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Per-bridge configuration slices, keyed by bridge identity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeConfigs {
    slices: HashMap<BridgeId, BridgeConfig>,
}

impl BridgeConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, bridge: impl Into<BridgeId>, config: BridgeConfig) -> Self {
        self.insert(bridge, config);
        self
    }

    pub fn insert(&mut self, bridge: impl Into<BridgeId>, config: BridgeConfig) {
        self.slices.insert(bridge.into(), config);
    }

    pub fn get(&self, bridge: &BridgeId) -> Option<&BridgeConfig> {
        self.slices.get(bridge)
    }

    /// The slice for `bridge`, or an empty configuration if there is none
    pub fn config_for(&self, bridge: &BridgeId) -> BridgeConfig {
        self.slices.get(bridge).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Parse a JSON document of the form `{"<bridge>": {...}, ...}`
    ///
    /// `null` is an empty document; so is a `null` slice.
    pub fn from_json_str(document: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(document)?;
        let entries = match value {
            Value::Null => return Ok(Self::new()),
            Value::Object(entries) => entries,
            other => {
                return Err(DiscoveryError::Config(format!(
                    "bridge configuration must be a JSON object, got {}",
                    json_type(&other)
                )));
            }
        };

        let mut configs = Self::new();
        for (bridge, slice) in entries {
            let config = BridgeConfig::try_from(slice).map_err(|e| {
                DiscoveryError::Config(format!("bridge '{bridge}': {e}"))
            })?;
            configs.insert(bridge, config);
        }
        Ok(configs)
    }

    /// Read and parse a JSON document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let document = std::fs::read_to_string(path)?;
        Self::from_json_str(&document)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
