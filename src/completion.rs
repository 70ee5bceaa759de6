//! Completion proxies receiving the terminal outcome of a dispatch

use crate::client::RestClient;
use crate::errors::RequestError;
use crate::log_entry::{LogLevel, RequestLogEntry};
use crate::logger::Logger;
use crate::request::{RequestModel, ResponseModel};
use rand::Rng;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Receives exactly one terminal outcome per `RestClient::execute` call.
///
/// Both methods consume the proxy, so a second notification cannot compile.
pub trait CompletionProxy: Send + 'static {
    fn on_success(self: Box<Self>, response: ResponseModel);

    fn on_failure(self: Box<Self>, error: RequestError);

    fn complete(self: Box<Self>, outcome: Result<ResponseModel, RequestError>) {
        match outcome {
            Ok(response) => self.on_success(response),
            Err(error) => self.on_failure(error),
        }
    }
}

/// Adapts a pair of closures.
pub struct CallbackCompletionProxy<S, F> {
    success: S,
    failure: F,
}

impl<S, F> CallbackCompletionProxy<S, F>
where
    S: FnOnce(ResponseModel) + Send + 'static,
    F: FnOnce(RequestError) + Send + 'static,
{
    pub fn new(success: S, failure: F) -> Self {
        Self { success, failure }
    }
}

impl<S, F> CompletionProxy for CallbackCompletionProxy<S, F>
where
    S: FnOnce(ResponseModel) + Send + 'static,
    F: FnOnce(RequestError) + Send + 'static,
{
    fn on_success(self: Box<Self>, response: ResponseModel) {
        (self.success)(response)
    }

    fn on_failure(self: Box<Self>, error: RequestError) {
        (self.failure)(error)
    }
}

/// Forwards the outcome into a oneshot channel.
pub struct ChannelCompletionProxy {
    sender: oneshot::Sender<Result<ResponseModel, RequestError>>,
}

impl ChannelCompletionProxy {
    pub fn new() -> (Self, PendingResponse) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, PendingResponse { receiver })
    }

    fn deliver(self, outcome: Result<ResponseModel, RequestError>) {
        if self.sender.send(outcome).is_err() {
            debug!("Response receiver dropped before completion");
        }
    }
}

impl CompletionProxy for ChannelCompletionProxy {
    fn on_success(self: Box<Self>, response: ResponseModel) {
        self.deliver(Ok(response))
    }

    fn on_failure(self: Box<Self>, error: RequestError) {
        self.deliver(Err(error))
    }
}

/// Receiving half of a `ChannelCompletionProxy`.
#[derive(Debug)]
pub struct PendingResponse {
    receiver: oneshot::Receiver<Result<ResponseModel, RequestError>>,
}

impl PendingResponse {
    pub async fn wait(self) -> Result<ResponseModel, RequestError> {
        self.receiver.await.unwrap_or_else(|_| {
            Err(RequestError::Transport(
                "completion proxy dropped without an outcome".to_string(),
            ))
        })
    }
}

/// Exponential backoff settings for `RetryCompletionProxy`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_ms: 1000,
            max_jitter_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self.retry_backoff_ms.saturating_mul(2_u64.pow(exponent));
        let jitter = if self.max_jitter_ms > 0 {
            rand::rng().random_range(0..=self.max_jitter_ms)
        } else {
            0
        };
        Duration::from_millis(base.saturating_add(jitter))
    }
}

/// Re-executes retriable failures through the client, handing the final
/// outcome to the wrapped proxy.
pub struct RetryCompletionProxy {
    client: RestClient,
    request: RequestModel,
    policy: RetryPolicy,
    attempt: u32,
    inner: Box<dyn CompletionProxy>,
}

impl RetryCompletionProxy {
    pub fn new(
        client: RestClient,
        request: RequestModel,
        policy: RetryPolicy,
        inner: Box<dyn CompletionProxy>,
    ) -> Self {
        Self {
            client,
            request,
            policy,
            attempt: 0,
            inner,
        }
    }

    /// Execute `request` on `client` with retries
    pub fn execute(
        client: &RestClient,
        request: RequestModel,
        policy: RetryPolicy,
        inner: Box<dyn CompletionProxy>,
    ) {
        let proxy = Self::new(client.clone(), request.clone(), policy, inner);
        client.execute(request, Box::new(proxy));
    }
}

impl CompletionProxy for RetryCompletionProxy {
    fn on_success(self: Box<Self>, response: ResponseModel) {
        self.inner.on_success(response)
    }

    fn on_failure(self: Box<Self>, error: RequestError) {
        if !error.is_retriable() || self.attempt >= self.policy.max_retries {
            return self.inner.on_failure(error);
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return self.inner.on_failure(error);
        };

        let mut next = *self;
        next.attempt += 1;
        let delay = next.policy.backoff(next.attempt);

        warn!(
            "Request {} failed ({}), retry {} of {} in {}ms",
            next.request.request_id(),
            error,
            next.attempt,
            next.policy.max_retries,
            delay.as_millis()
        );

        // keeps the client's shutdown waiting until the retry is queued
        let in_flight = next.client.track();
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let client = next.client.clone();
            let request = next.request.clone();
            client.execute(request, Box::new(next));
            drop(in_flight);
        });
    }
}

/// Records every outcome as a request log shard before forwarding it.
pub struct LoggingCompletionProxy {
    logger: Logger,
    url: String,
    method: String,
    request_id: String,
    started: Instant,
    inner: Box<dyn CompletionProxy>,
}

impl LoggingCompletionProxy {
    pub fn new(logger: Logger, request: &RequestModel, inner: Box<dyn CompletionProxy>) -> Self {
        Self {
            logger,
            url: request.url().to_string(),
            method: request.method().to_string(),
            request_id: request.request_id().to_string(),
            started: Instant::now(),
            inner,
        }
    }

    fn entry(&self, status_code: Option<u16>, error: Option<String>) -> RequestLogEntry {
        RequestLogEntry {
            request_id: self.request_id.clone(),
            url: self.url.clone(),
            method: self.method.clone(),
            status_code,
            duration_ms: self.started.elapsed().as_millis() as u64,
            error,
        }
    }
}

impl CompletionProxy for LoggingCompletionProxy {
    fn on_success(self: Box<Self>, response: ResponseModel) {
        let entry = self.entry(Some(response.status_code), None);
        self.logger.log(&entry, LogLevel::Info);
        self.inner.on_success(response)
    }

    fn on_failure(self: Box<Self>, error: RequestError) {
        let status = match &error {
            RequestError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        };
        let entry = self.entry(status, Some(error.kind().to_string()));
        self.logger.log(&entry, LogLevel::Error);
        self.inner.on_failure(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn response() -> ResponseModel {
        ResponseModel {
            status_code: 200,
            headers: Default::default(),
            body: b"ok".to_vec(),
            timestamp: 1,
            request: RequestModel::builder("/a").build().unwrap(),
        }
    }

    #[test]
    fn test_callback_proxy_routes_outcomes() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let success_log = Arc::clone(&seen);
        let proxy: Box<dyn CompletionProxy> = Box::new(CallbackCompletionProxy::new(
            move |r: ResponseModel| success_log.lock().unwrap().push(format!("ok:{}", r.status_code)),
            |_| panic!("failure must not fire"),
        ));
        proxy.complete(Ok(response()));

        let failure_log = Arc::clone(&seen);
        let proxy: Box<dyn CompletionProxy> = Box::new(CallbackCompletionProxy::new(
            |_| panic!("success must not fire"),
            move |e: RequestError| failure_log.lock().unwrap().push(format!("err:{}", e.kind())),
        ));
        proxy.complete(Err(RequestError::QueueClosed));

        assert_eq!(*seen.lock().unwrap(), vec!["ok:200", "err:queue_closed"]);
    }

    #[tokio::test]
    async fn test_channel_proxy_delivers_once() {
        let (proxy, pending) = ChannelCompletionProxy::new();
        Box::new(proxy).on_failure(RequestError::Timeout(Duration::from_secs(1)));

        assert_eq!(
            pending.wait().await,
            Err(RequestError::Timeout(Duration::from_secs(1)))
        );
    }

    #[tokio::test]
    async fn test_dropped_channel_proxy_reports_failure() {
        let (proxy, pending) = ChannelCompletionProxy::new();
        drop(proxy);

        assert!(matches!(pending.wait().await, Err(RequestError::Transport(_))));
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let policy = RetryPolicy {
            max_retries: 5,
            retry_backoff_ms: 100,
            max_jitter_ms: 0,
        };

        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_jitter_is_bounded() {
        let policy = RetryPolicy {
            max_retries: 1,
            retry_backoff_ms: 100,
            max_jitter_ms: 50,
        };

        for _ in 0..100 {
            let delay = policy.backoff(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }
}
