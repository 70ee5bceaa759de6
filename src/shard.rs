//! Persisted log shard record

use crate::log_entry::LogLevel;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One immutable log record as written to the shard store.
///
/// The serialized field names (`id`, `type`, `timestamp`, `level`, `data`)
/// are read back by uploaders and must stay stable.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Shard {
    id: String,
    #[serde(rename = "type")]
    shard_type: String,
    timestamp: u64,
    level: LogLevel,
    data: Value,
}

impl Shard {
    pub fn new(
        id: impl Into<String>,
        shard_type: impl Into<String>,
        timestamp: u64,
        level: LogLevel,
        data: Value,
    ) -> Self {
        Self {
            id: id.into(),
            shard_type: shard_type.into(),
            timestamp,
            level,
            data,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn shard_type(&self) -> &str {
        &self.shard_type
    }

    /// Milliseconds since the Unix epoch
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp as i64).single()
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_layout() {
        let shard = Shard::new("id-1", "log_message", 1_700_000_000_123, LogLevel::Warn, json!({"message": "hi"}));

        let value: Value = serde_json::from_slice(&shard.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "id-1",
                "type": "log_message",
                "timestamp": 1_700_000_000_123u64,
                "level": "WARN",
                "data": {"message": "hi"}
            })
        );
    }

    #[test]
    fn test_reads_previously_persisted_record() {
        let persisted = br#"{"id":"a","type":"log_request","timestamp":5,"level":"ERROR","data":{}}"#;
        let shard = Shard::from_json(persisted).unwrap();

        assert_eq!(shard.id(), "a");
        assert_eq!(shard.shard_type(), "log_request");
        assert_eq!(shard.level(), LogLevel::Error);
    }

    #[test]
    fn test_datetime() {
        let shard = Shard::new("id", "t", 1_000, LogLevel::Info, Value::Null);
        assert_eq!(shard.datetime().map(|dt| dt.timestamp()), Some(1));
    }
}
