//! Error types for request dispatch and shard logging

use std::fmt;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug)]
pub enum CoreError {
    /// IO operation failed
    Io(std::io::Error),

    /// HTTP client could not be built
    Http(reqwest::Error),

    /// JSON serialization/deserialization failed
    Json(serde_json::Error),

    /// Configuration error
    Config(String),

    /// Request model failed validation
    InvalidRequest(String),

    /// Dispatch of a request failed
    Request(RequestError),

    /// Shard storage failed
    Storage(StorageError),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Io(err) => write!(f, "IO error: {}", err),
            CoreError::Http(err) => write!(f, "HTTP error: {}", err),
            CoreError::Json(err) => write!(f, "JSON error: {}", err),
            CoreError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CoreError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            CoreError::Request(err) => write!(f, "Request error: {}", err),
            CoreError::Storage(err) => write!(f, "Storage error: {}", err),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::Io(err) => Some(err),
            CoreError::Http(err) => Some(err),
            CoreError::Json(err) => Some(err),
            CoreError::Request(err) => Some(err),
            CoreError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Io(err)
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::Http(err)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Json(err)
    }
}

impl From<RequestError> for CoreError {
    fn from(err: RequestError) -> Self {
        CoreError::Request(err)
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        CoreError::Storage(err)
    }
}

/// A request mapper refused or failed to transform a request.
#[derive(Debug, Clone, PartialEq)]
pub struct MapperError {
    pub mapper: String,
    pub message: String,
}

impl MapperError {
    pub fn new(mapper: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            mapper: mapper.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for MapperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mapper '{}' failed: {}", self.mapper, self.message)
    }
}

impl std::error::Error for MapperError {}

/// Terminal failure of a dispatched request, delivered to a completion proxy.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestError {
    /// A mapper in the chain rejected the request; nothing was sent
    Mapper(MapperError),

    /// The underlying transport failed before a response arrived
    Transport(String),

    /// The server answered with a status outside 200..=299
    HttpStatus { status: u16, body: String },

    /// The request exceeded its timeout
    Timeout(Duration),

    /// The request body could not be encoded
    Serialization(String),

    /// A mapper or the transport panicked while handling the request
    Panicked(String),

    /// The client was already shut down when the request was submitted
    QueueClosed,
}

impl RequestError {
    /// Short machine-readable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Mapper(_) => "mapper",
            RequestError::Transport(_) => "transport",
            RequestError::HttpStatus { .. } => "http_status",
            RequestError::Timeout(_) => "timeout",
            RequestError::Serialization(_) => "serialization",
            RequestError::Panicked(_) => "panicked",
            RequestError::QueueClosed => "queue_closed",
        }
    }

    /// Whether re-sending the same request could plausibly succeed
    pub fn is_retriable(&self) -> bool {
        match self {
            RequestError::Transport(_) | RequestError::Timeout(_) => true,
            RequestError::HttpStatus { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Mapper(err) => write!(f, "{}", err),
            RequestError::Transport(msg) => write!(f, "transport failure: {}", msg),
            RequestError::HttpStatus { status, body } => {
                write!(f, "unexpected status {}: {}", status, body)
            }
            RequestError::Timeout(duration) => {
                write!(f, "request timed out after {}ms", duration.as_millis())
            }
            RequestError::Serialization(msg) => write!(f, "body serialization failed: {}", msg),
            RequestError::Panicked(msg) => write!(f, "dispatch panicked: {}", msg),
            RequestError::QueueClosed => write!(f, "dispatch queue is shut down"),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RequestError::Mapper(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MapperError> for RequestError {
    fn from(err: MapperError) -> Self {
        RequestError::Mapper(err)
    }
}

/// Failure on the logging path. Never returned to callers of `Logger::log`.
#[derive(Debug)]
pub enum StorageError {
    /// Filesystem operation failed
    Io(std::io::Error),

    /// Shard or entry (de)serialization failed
    Json(serde_json::Error),

    /// The repository refused the operation
    Unavailable(String),

    /// The logger was already shut down
    Closed,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "IO error: {}", err),
            StorageError::Json(err) => write!(f, "JSON error: {}", err),
            StorageError::Unavailable(msg) => write!(f, "repository unavailable: {}", msg),
            StorageError::Closed => write!(f, "logger is shut down"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            StorageError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Json(err)
    }
}
