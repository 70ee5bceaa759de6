//! Clock and identifier sources shared by the client and the logger

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Supplies wall-clock timestamps in milliseconds since the Unix epoch.
pub trait TimestampProvider: Send + Sync {
    fn provide_timestamp(&self) -> u64;
}

/// Supplies unique identifiers for shards and requests.
pub trait UuidProvider: Send + Sync {
    fn provide_uuid(&self) -> String;
}

/// System clock that never goes backwards within one provider instance.
#[derive(Debug, Default)]
pub struct SystemTimestampProvider {
    last: AtomicU64,
}

impl SystemTimestampProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimestampProvider for SystemTimestampProvider {
    fn provide_timestamp(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let previous = self.last.fetch_max(now, Ordering::SeqCst);
        previous.max(now)
    }
}

/// Random (v4) uuid provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomUuidProvider;

impl UuidProvider for RandomUuidProvider {
    fn provide_uuid(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
