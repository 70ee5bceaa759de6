//! Configuration for the request client and the shard logger

use crate::mapper::MapperChain;
use crate::request::RequestModel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL joined onto relative request endpoints
    pub base_url: Option<String>,

    /// Headers merged into every outgoing request
    pub additional_headers: HashMap<String, String>,

    /// Timeout for requests that do not set their own
    pub request_timeout: Duration,

    /// Number of concurrent dispatch workers
    pub dispatch_workers: usize,

    /// Number of shard persistence workers; 1 keeps shards in call order
    pub log_workers: usize,

    /// Directory holding persisted log shards
    pub shard_dir: PathBuf,

    /// User agent sent by the HTTP transport
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            additional_headers: HashMap::new(),
            request_timeout: Duration::from_secs(30),
            dispatch_workers: 4,
            log_workers: 1,
            shard_dir: PathBuf::from("shards"),
            user_agent: format!("mobile_core/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(base_url) = env::var("CORE_BASE_URL") {
            config.base_url = Some(base_url);
        }

        if let Ok(headers) = env::var("CORE_ADDITIONAL_HEADERS") {
            config.additional_headers = parse_header_list(&headers);
        }

        if let Ok(timeout) = env::var("CORE_REQUEST_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.request_timeout = Duration::from_secs(seconds);
            }
        }

        if let Ok(workers) = env::var("CORE_DISPATCH_WORKERS") {
            if let Ok(count) = workers.parse() {
                config.dispatch_workers = count;
            }
        }

        if let Ok(workers) = env::var("CORE_LOG_WORKERS") {
            if let Ok(count) = workers.parse() {
                config.log_workers = count;
            }
        }

        if let Ok(shard_dir) = env::var("CORE_SHARD_DIR") {
            config.shard_dir = PathBuf::from(shard_dir);
        }

        if let Ok(user_agent) = env::var("CORE_USER_AGENT") {
            config.user_agent = user_agent;
        }

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if let Some(base_url) = &self.base_url {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(format!("base_url must be an http(s) url: {}", base_url));
            }
        }

        if self.additional_headers.keys().any(|name| name.trim().is_empty()) {
            return Err("additional header names cannot be empty".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("request_timeout must be greater than 0".to_string());
        }

        if self.dispatch_workers == 0 {
            return Err("dispatch_workers must be greater than 0".to_string());
        }

        if self.log_workers == 0 {
            return Err("log_workers must be greater than 0".to_string());
        }

        if self.shard_dir.as_os_str().is_empty() {
            return Err("shard_dir cannot be empty".to_string());
        }

        Ok(())
    }

    /// Freeze the request-side settings together with a mapper chain
    pub fn client_config(&self, mappers: MapperChain) -> ClientConfig {
        ClientConfig::new(self.additional_headers.clone(), mappers, self.request_timeout)
    }
}

/// Parse `Name=value,Other=value` into a header map
pub fn parse_header_list(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Request pipeline settings, immutable once the client is built and shared
/// read-only by every in-flight dispatch.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    additional_headers: HashMap<String, String>,
    mappers: MapperChain,
    default_timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        additional_headers: HashMap<String, String>,
        mappers: MapperChain,
        default_timeout: Duration,
    ) -> Self {
        Self {
            additional_headers,
            mappers,
            default_timeout,
        }
    }

    pub fn additional_headers(&self) -> &HashMap<String, String> {
        &self.additional_headers
    }

    pub fn mappers(&self) -> &MapperChain {
        &self.mappers
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Merge the additional headers into a mapped request. Client headers
    /// overwrite mapper headers with the same name.
    pub fn merge_headers(&self, request: RequestModel) -> RequestModel {
        request.with_headers(self.additional_headers.clone())
    }

    pub fn effective_timeout(&self, request: &RequestModel) -> Duration {
        request.timeout().unwrap_or(self.default_timeout)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(HashMap::new(), MapperChain::new(), Config::default().request_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::HeaderMapper;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
        assert_eq!(Config::default().log_workers, 1);
    }

    #[test]
    fn test_validation_failures() {
        let config = Config { dispatch_workers: 0, ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config { log_workers: 0, ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config { request_timeout: Duration::ZERO, ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config { base_url: Some("ftp://host".to_string()), ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config {
            additional_headers: HashMap::from([(" ".to_string(), "v".to_string())]),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_header_list() {
        let headers = parse_header_list("X-Client-Id = abc, X-Sdk=1.0,broken,=skip");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("X-Client-Id").map(String::as_str), Some("abc"));
        assert_eq!(headers.get("X-Sdk").map(String::as_str), Some("1.0"));
    }

    #[test]
    fn test_client_headers_take_precedence() {
        let config = ClientConfig::new(
            HashMap::from([("Authorization".to_string(), "client".to_string())]),
            MapperChain::new().with(HeaderMapper::single("Authorization", "mapper")),
            Duration::from_secs(5),
        );

        let request = RequestModel::builder("/a").build().unwrap();
        let mapped = config.mappers().apply(request).unwrap();
        let merged = config.merge_headers(mapped);

        assert_eq!(merged.header("Authorization"), Some("client"));
    }

    #[test]
    fn test_effective_timeout() {
        let config = ClientConfig::default();
        let plain = RequestModel::builder("/a").build().unwrap();
        let custom = RequestModel::builder("/a").timeout(Duration::from_secs(2)).build().unwrap();

        assert_eq!(config.effective_timeout(&plain), Duration::from_secs(30));
        assert_eq!(config.effective_timeout(&custom), Duration::from_secs(2));
    }
}
