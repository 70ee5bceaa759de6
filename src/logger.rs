//! Fire-and-forget logger persisting entries as shards

use crate::diagnostics::{DiagnosticEvent, DiagnosticSink, TracingDiagnostics};
use crate::errors::StorageError;
use crate::log_entry::{LogEntry, LogLevel};
use crate::providers::{RandomUuidProvider, SystemTimestampProvider, TimestampProvider, UuidProvider};
use crate::repository::ShardRepository;
use crate::shard::Shard;
use crate::work_queue::{Job, WorkQueue};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Stamps log entries and appends them to a shard repository off the
/// caller's task.
///
/// `log` never fails and never waits for storage. Failures go to the
/// diagnostic sink. With a single worker (the default) shards are appended in
/// the order `log` was called; with more workers append order is unspecified.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    repository: Arc<dyn ShardRepository>,
    queue: WorkQueue,
    timestamp_provider: Arc<dyn TimestampProvider>,
    uuid_provider: Arc<dyn UuidProvider>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl Logger {
    pub fn builder(repository: Arc<dyn ShardRepository>) -> LoggerBuilder {
        LoggerBuilder::new(repository)
    }

    pub fn log(&self, entry: &dyn LogEntry, level: LogLevel) {
        let inner = &self.inner;
        let shard_id = inner.uuid_provider.provide_uuid();
        let timestamp = inner.timestamp_provider.provide_timestamp();
        let shard_type = entry.topic().to_string();

        let data = match entry.data() {
            Ok(data) => data,
            Err(e) => {
                inner.diagnostics.record(DiagnosticEvent {
                    shard_id,
                    shard_type,
                    error: StorageError::Json(e),
                });
                return;
            }
        };

        let job = AppendJob {
            shard: Shard::new(shard_id, shard_type, timestamp, level, data),
            repository: Arc::clone(&inner.repository),
            diagnostics: Arc::clone(&inner.diagnostics),
        };

        if let Err(job) = inner.queue.submit(job) {
            inner.diagnostics.record(DiagnosticEvent {
                shard_id: job.shard.id().to_string(),
                shard_type: job.shard.shard_type().to_string(),
                error: StorageError::Closed,
            });
        }
    }

    pub fn repository(&self) -> Arc<dyn ShardRepository> {
        Arc::clone(&self.inner.repository)
    }

    /// Persist everything logged so far, then stop accepting entries
    pub async fn shutdown(&self) {
        info!("Draining logger queue");
        self.inner.queue.shutdown().await;
    }
}

struct AppendJob {
    shard: Shard,
    repository: Arc<dyn ShardRepository>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

#[async_trait]
impl Job for AppendJob {
    async fn run(self: Box<Self>) {
        let shard_id = self.shard.id().to_string();
        let shard_type = self.shard.shard_type().to_string();

        match self.repository.append(self.shard).await {
            Ok(()) => debug!("Persisted shard {} ({})", shard_id, shard_type),
            Err(error) => self.diagnostics.record(DiagnosticEvent {
                shard_id,
                shard_type,
                error,
            }),
        }
    }
}

pub struct LoggerBuilder {
    repository: Arc<dyn ShardRepository>,
    workers: usize,
    timestamp_provider: Arc<dyn TimestampProvider>,
    uuid_provider: Arc<dyn UuidProvider>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl LoggerBuilder {
    fn new(repository: Arc<dyn ShardRepository>) -> Self {
        Self {
            repository,
            workers: 1,
            timestamp_provider: Arc::new(SystemTimestampProvider::new()),
            uuid_provider: Arc::new(RandomUuidProvider),
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn timestamp_provider(mut self, provider: Arc<dyn TimestampProvider>) -> Self {
        self.timestamp_provider = provider;
        self
    }

    pub fn uuid_provider(mut self, provider: Arc<dyn UuidProvider>) -> Self {
        self.uuid_provider = provider;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Must be called inside a tokio runtime
    pub fn build(self) -> Logger {
        Logger {
            inner: Arc::new(LoggerInner {
                repository: self.repository,
                queue: WorkQueue::new("logger", self.workers),
                timestamp_provider: self.timestamp_provider,
                uuid_provider: self.uuid_provider,
                diagnostics: self.diagnostics,
            }),
        }
    }
}
