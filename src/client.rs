//! REST client: mapper chain, header merge, queued dispatch, completion routing

use crate::completion::{ChannelCompletionProxy, CompletionProxy};
use crate::config::ClientConfig;
use crate::errors::{MapperError, RequestError};
use crate::providers::{SystemTimestampProvider, TimestampProvider};
use crate::request::{RequestModel, ResponseModel};
use crate::transport::Transport;
use crate::work_queue::{Job, WorkQueue};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, error, info, instrument, warn};

/// Dispatches request models and reports each outcome to its completion proxy.
///
/// Policies:
/// - mappers run in registration order before anything else;
/// - additional headers are merged after mapping and win over mapper headers;
/// - any status outside 200..=299 is delivered as `RequestError::HttpStatus`;
/// - no retries here, see `RetryCompletionProxy`.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    timestamp_provider: Arc<dyn TimestampProvider>,
    queue: WorkQueue,
    metrics: DispatchMetrics,
    in_flight: Arc<InFlightCounter>,
}

impl RestClient {
    /// Must be called inside a tokio runtime
    pub fn new(config: Arc<ClientConfig>, transport: Arc<dyn Transport>, workers: usize) -> Self {
        Self::with_timestamp_provider(
            config,
            transport,
            workers,
            Arc::new(SystemTimestampProvider::new()),
        )
    }

    pub fn with_timestamp_provider(
        config: Arc<ClientConfig>,
        transport: Arc<dyn Transport>,
        workers: usize,
        timestamp_provider: Arc<dyn TimestampProvider>,
    ) -> Self {
        info!(
            "Creating REST client with {} workers, mappers: {:?}",
            workers.max(1),
            config.mappers()
        );

        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                timestamp_provider,
                queue: WorkQueue::new("rest-client", workers),
                metrics: DispatchMetrics::default(),
                in_flight: Arc::new(InFlightCounter::default()),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Queue `request` for dispatch and return immediately.
    ///
    /// `proxy` receives exactly one outcome, normally from a worker task. If
    /// the client is already shut down it receives `QueueClosed` right away.
    #[instrument(skip_all, fields(request_id = %request.request_id()))]
    pub fn execute(&self, request: RequestModel, proxy: Box<dyn CompletionProxy>) {
        let job = DispatchJob {
            inner: Arc::clone(&self.inner),
            request,
            proxy,
            _in_flight: self.track(),
        };

        if let Err(job) = self.inner.queue.submit(job) {
            warn!("Request {} submitted after shutdown", job.request.request_id());
            self.inner.metrics.record(&Err(RequestError::QueueClosed), Duration::ZERO);
            job.proxy.on_failure(RequestError::QueueClosed);
        }
    }

    /// Execute and wait for the outcome
    pub async fn send(&self, request: RequestModel) -> Result<ResponseModel, RequestError> {
        let (proxy, pending) = ChannelCompletionProxy::new();
        self.execute(request, Box::new(proxy));
        pending.wait().await
    }

    pub fn metrics(&self) -> DispatchMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Keeps `shutdown` from closing the queue until the guard is dropped.
    /// Held by queued jobs and by scheduled retries.
    pub(crate) fn track(&self) -> InFlight {
        InFlight::new(Arc::clone(&self.inner.in_flight))
    }

    /// Finish every queued request and pending retry, then refuse new ones
    pub async fn shutdown(&self) {
        info!("Draining REST client queue");
        self.inner.in_flight.wait_idle().await;
        self.inner.queue.shutdown().await;

        let metrics = self.metrics();
        info!(
            "Final dispatch metrics - {} dispatched, {} succeeded, {} failed",
            metrics.dispatched, metrics.succeeded, metrics.failed
        );
    }
}

impl ClientInner {
    async fn dispatch(&self, request: RequestModel) -> Result<ResponseModel, RequestError> {
        let mapped = self.config.mappers().apply(request)?;
        if mapped.url().trim().is_empty() {
            return Err(MapperError::new("chain", "mapped request has an empty endpoint").into());
        }
        let prepared = self.config.merge_headers(mapped);
        let body = prepared.body().encode()?;
        let timeout = self.config.effective_timeout(&prepared);

        let response = tokio::time::timeout(timeout, self.transport.send(&prepared, body, timeout))
            .await
            .map_err(|_| RequestError::Timeout(timeout))??;

        if !(200..=299).contains(&response.status) {
            return Err(RequestError::HttpStatus {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }

        Ok(ResponseModel {
            status_code: response.status,
            headers: response.headers,
            body: response.body,
            timestamp: self.timestamp_provider.provide_timestamp(),
            request: prepared,
        })
    }
}

struct DispatchJob {
    inner: Arc<ClientInner>,
    request: RequestModel,
    proxy: Box<dyn CompletionProxy>,
    _in_flight: InFlight,
}

#[async_trait]
impl Job for DispatchJob {
    async fn run(self: Box<Self>) {
        let DispatchJob {
            inner,
            request,
            proxy,
            _in_flight,
        } = *self;
        let request_id = request.request_id().to_string();
        let started = Instant::now();

        let outcome = match AssertUnwindSafe(inner.dispatch(request)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Request {} panicked during dispatch: {}", request_id, message);
                Err(RequestError::Panicked(message))
            }
        };
        inner.metrics.record(&outcome, started.elapsed());

        match &outcome {
            Ok(response) => debug!("Request {} completed with {}", request_id, response.status_code),
            Err(e) => debug!("Request {} failed: {}", request_id, e),
        }

        proxy.complete(outcome);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Count of queued jobs and scheduled retries
#[derive(Debug, Default)]
struct InFlightCounter {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlightCounter {
    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Guard over one unit of outstanding client work
#[derive(Debug)]
pub(crate) struct InFlight {
    counter: Arc<InFlightCounter>,
}

impl InFlight {
    fn new(counter: Arc<InFlightCounter>) -> Self {
        counter.count.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.counter.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.counter.idle.notify_waiters();
        }
    }
}

#[derive(Debug, Default)]
struct DispatchMetrics {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    mapper_rejections: AtomicU64,
    timeouts: AtomicU64,
    total_duration_ms: AtomicU64,
}

impl DispatchMetrics {
    fn record(&self, outcome: &Result<ResponseModel, RequestError>, duration: Duration) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);

        match outcome {
            Ok(_) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                match error {
                    RequestError::Mapper(_) => {
                        self.mapper_rejections.fetch_add(1, Ordering::Relaxed);
                    }
                    RequestError::Timeout(_) => {
                        self.timeouts.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {}
                }
            }
        }
    }

    fn snapshot(&self) -> DispatchMetricsSnapshot {
        let dispatched = self.dispatched.load(Ordering::Relaxed);
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let total_duration_ms = self.total_duration_ms.load(Ordering::Relaxed);

        DispatchMetricsSnapshot {
            dispatched,
            succeeded,
            failed: self.failed.load(Ordering::Relaxed),
            mapper_rejections: self.mapper_rejections.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            success_rate: if dispatched > 0 {
                (succeeded as f64 / dispatched as f64) * 100.0
            } else {
                0.0
            },
            avg_duration_ms: if dispatched > 0 { total_duration_ms / dispatched } else { 0 },
        }
    }
}

/// Snapshot of dispatch metrics
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchMetricsSnapshot {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub mapper_rejections: u64,
    pub timeouts: u64,
    pub success_rate: f64,
    pub avg_duration_ms: u64,
}
