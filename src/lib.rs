//! Mobile SDK Core Library
//!
//! Request dispatch through a mapper chain and pluggable completion proxies,
//! plus a fire-and-forget logger that persists leveled entries as shards for
//! later upload.

pub mod config;
pub mod errors;
pub mod providers;
pub mod request;
pub mod mapper;
pub mod transport;
pub mod work_queue;
pub mod completion;
pub mod client;
pub mod log_entry;
pub mod shard;
pub mod repository;
pub mod diagnostics;
pub mod logger;
pub mod inbox;
pub mod sdk;

pub use config::{ClientConfig, Config};
pub use client::RestClient;
pub use completion::{CompletionProxy, ChannelCompletionProxy, RetryCompletionProxy, RetryPolicy};
pub use errors::{CoreError, MapperError, RequestError, Result, StorageError};
pub use log_entry::{LogEntry, LogLevel};
pub use logger::Logger;
pub use mapper::{MapperChain, RequestModelMapper};
pub use repository::{FileShardRepository, InMemoryShardRepository, ShardRepository};
pub use request::{HttpMethod, RequestModel, ResponseModel};
pub use sdk::MobileCore;
pub use shard::Shard;
