//! Side channel for failures on the logging path

use crate::errors::StorageError;
use std::sync::Mutex;
use tracing::{debug, warn};

/// A logging-path failure that was hidden from the caller of `Logger::log`.
#[derive(Debug)]
pub struct DiagnosticEvent {
    pub shard_id: String,
    pub shard_type: String,
    pub error: StorageError,
}

pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: DiagnosticEvent);
}

/// Emits each event as a `tracing` warning
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn record(&self, event: DiagnosticEvent) {
        warn!(
            shard_id = %event.shard_id,
            shard_type = %event.shard_type,
            "Failed to persist log shard: {}",
            event.error
        );
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<DiagnosticEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

impl DiagnosticSink for CollectingDiagnostics {
    fn record(&self, event: DiagnosticEvent) {
        debug!("Recorded diagnostic for shard {}: {}", event.shard_id, event.error);
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
