//! HTTP transport underneath the REST client

use crate::errors::{CoreError, RequestError, Result};
use crate::request::RequestModel;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Raw answer from the transport, before any status policy is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Sends one fully prepared request. Implementations report only transport
/// level failures; status codes are returned as-is.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &RequestModel,
        body: Option<Vec<u8>>,
        timeout: Duration,
    ) -> std::result::Result<TransportResponse, RequestError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Option<String>,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(base_url: Option<String>, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(CoreError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    /// Join relative endpoints onto the base url; absolute urls pass through
    pub fn resolve_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }

        match &self.base_url {
            Some(base) if endpoint.starts_with('/') => format!("{}{}", base, endpoint),
            Some(base) => format!("{}/{}", base, endpoint),
            None => endpoint.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &RequestModel,
        body: Option<Vec<u8>>,
        timeout: Duration,
    ) -> std::result::Result<TransportResponse, RequestError> {
        let url = self.resolve_url(request.url());

        debug!("Sending {} {} (request {})", request.method(), url, request.request_id());

        let mut builder = self
            .client
            .request(request.method().into(), &url)
            .timeout(timeout);

        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                RequestError::Timeout(timeout)
            } else {
                RequestError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RequestError::Timeout(timeout)
                } else {
                    RequestError::Transport(e.to_string())
                }
            })?
            .to_vec();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::HttpMethod;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_url_resolution() {
        let transport = HttpTransport::new(Some("https://api.example.com/".to_string()), "test").unwrap();

        assert_eq!(transport.resolve_url("/v3/events"), "https://api.example.com/v3/events");
        assert_eq!(transport.resolve_url("v3/events"), "https://api.example.com/v3/events");
        assert_eq!(transport.resolve_url("http://other/x"), "http://other/x");
    }

    #[tokio::test]
    async fn test_send_passes_headers_and_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/events"))
            .and(header("X-Client", "sdk"))
            .and(body_string("payload"))
            .respond_with(ResponseTemplate::new(201).insert_header("X-Request-Id", "r-1"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new(Some(mock_server.uri()), "test").unwrap();
        let request = RequestModel::builder("/events")
            .method(HttpMethod::Post)
            .header("X-Client", "sdk")
            .build()
            .unwrap();

        let response = transport
            .send(&request, Some(b"payload".to_vec()), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(response.headers.get("x-request-id").map(String::as_str), Some("r-1"));
    }

    #[tokio::test]
    async fn test_error_status_is_not_a_transport_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new(Some(mock_server.uri()), "test").unwrap();
        let request = RequestModel::builder("/missing").build().unwrap();

        let response = transport.send(&request, None, Duration::from_secs(5)).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.body, b"nope".to_vec());
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new(Some(mock_server.uri()), "test").unwrap();
        let request = RequestModel::builder("/slow").build().unwrap();

        let result = transport.send(&request, None, Duration::from_millis(100)).await;
        assert_eq!(result, Err(RequestError::Timeout(Duration::from_millis(100))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let transport = HttpTransport::new(Some("http://127.0.0.1:1".to_string()), "test").unwrap();
        let request = RequestModel::builder("/x").build().unwrap();

        let result = transport.send(&request, None, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(RequestError::Transport(_))));
    }
}
