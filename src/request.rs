//! Request and response models

use crate::errors::{CoreError, RequestError, Result};
use crate::providers::{RandomUuidProvider, SystemTimestampProvider, TimestampProvider, UuidProvider};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Delete => write!(f, "DELETE"),
            HttpMethod::Patch => write!(f, "PATCH"),
            HttpMethod::Head => write!(f, "HEAD"),
        }
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            other => Err(CoreError::InvalidRequest(format!("unsupported method: {}", other))),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Bytes(Vec<u8>),
    Json(Value),
}

impl RequestBody {
    /// Encode the body into the bytes put on the wire
    pub fn encode(&self) -> std::result::Result<Option<Vec<u8>>, RequestError> {
        match self {
            RequestBody::Empty => Ok(None),
            RequestBody::Bytes(bytes) => Ok(Some(bytes.clone())),
            RequestBody::Json(value) => serde_json::to_vec(value)
                .map(Some)
                .map_err(|e| RequestError::Serialization(e.to_string())),
        }
    }

    fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        match self {
            RequestBody::Empty => 0u8.hash(&mut hasher),
            RequestBody::Bytes(bytes) => bytes.hash(&mut hasher),
            RequestBody::Json(value) => value.to_string().hash(&mut hasher),
        }
        hasher.finish()
    }
}

/// Identity of a request: same endpoint, method and body content.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    pub url: String,
    pub method: HttpMethod,
    pub body_hash: u64,
}

/// Immutable description of one outbound request.
///
/// Mappers never mutate a model in place; the `with_*` methods consume it and
/// return the transformed value.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestModel {
    request_id: String,
    timestamp: u64,
    url: String,
    method: HttpMethod,
    headers: HashMap<String, String>,
    body: RequestBody,
    timeout: Option<Duration>,
}

impl RequestModel {
    pub fn builder(url: impl Into<String>) -> RequestModelBuilder {
        RequestModelBuilder::new(url)
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity {
            url: self.url.clone(),
            method: self.method,
            body_hash: self.body.content_hash(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

pub struct RequestModelBuilder {
    url: String,
    method: HttpMethod,
    headers: HashMap<String, String>,
    body: RequestBody,
    timeout: Option<Duration>,
}

impl RequestModelBuilder {
    fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = RequestBody::Bytes(body);
        self
    }

    pub fn json(mut self, payload: Value) -> Self {
        self.body = RequestBody::Json(payload);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<RequestModel> {
        self.build_with(&SystemTimestampProvider::new(), &RandomUuidProvider)
    }

    pub fn build_with(
        self,
        timestamp_provider: &dyn TimestampProvider,
        uuid_provider: &dyn UuidProvider,
    ) -> Result<RequestModel> {
        if self.url.trim().is_empty() {
            return Err(CoreError::InvalidRequest("endpoint cannot be empty".to_string()));
        }

        if self.headers.keys().any(|name| name.trim().is_empty()) {
            return Err(CoreError::InvalidRequest("header names cannot be empty".to_string()));
        }

        if self.timeout == Some(Duration::ZERO) {
            return Err(CoreError::InvalidRequest("timeout must be greater than 0".to_string()));
        }

        Ok(RequestModel {
            request_id: uuid_provider.provide_uuid(),
            timestamp: timestamp_provider.provide_timestamp(),
            url: self.url,
            method: self.method,
            headers: self.headers,
            body: self.body,
            timeout: self.timeout,
        })
    }
}

/// Successful terminal outcome of a dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseModel {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub timestamp: u64,
    pub request: RequestModel,
}

impl ResponseModel {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status_code)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
