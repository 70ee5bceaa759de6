//! Log levels and the entry variants accepted by the logger

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Severity stored with every shard. Ordered `Trace < Debug < Info < Warn < Error`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "TRACE" | "VERBOSE" => LogLevel::Trace,
            "DEBUG" => LogLevel::Debug,
            "INFO" | "INFORMATION" => LogLevel::Info,
            "WARN" | "WARNING" => LogLevel::Warn,
            "ERROR" | "ERR" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// Something the logger can turn into a shard.
pub trait LogEntry: Send + Sync {
    /// Stored as the shard `type`
    fn topic(&self) -> &str;

    /// Stored as the shard `data`
    fn data(&self) -> Result<Value, serde_json::Error>;
}

/// Free-form text message
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageEntry {
    pub message: String,
    pub attributes: HashMap<String, String>,
}

impl MessageEntry {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl LogEntry for MessageEntry {
    fn topic(&self) -> &str {
        "log_message"
    }

    fn data(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Named structured event with arbitrary JSON attributes
#[derive(Clone, Debug, PartialEq)]
pub struct EventEntry {
    pub name: String,
    pub attributes: Map<String, Value>,
}

impl EventEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl LogEntry for EventEntry {
    fn topic(&self) -> &str {
        &self.name
    }

    fn data(&self) -> Result<Value, serde_json::Error> {
        Ok(Value::Object(self.attributes.clone()))
    }
}

/// Outcome of one dispatched request
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RequestLogEntry {
    pub request_id: String,
    pub url: String,
    pub method: String,
    pub status_code: Option<u16>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl LogEntry for RequestLogEntry {
    fn topic(&self) -> &str {
        "log_request"
    }

    fn data(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
