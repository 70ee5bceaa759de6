//! Wiring of the REST client and the shard logger from one `Config`

use crate::client::{DispatchMetricsSnapshot, RestClient};
use crate::completion::{CompletionProxy, LoggingCompletionProxy};
use crate::config::Config;
use crate::errors::{CoreError, Result};
use crate::logger::Logger;
use crate::mapper::MapperChain;
use crate::repository::FileShardRepository;
use crate::request::RequestModel;
use crate::transport::HttpTransport;
use std::sync::Arc;
use tracing::{info, instrument};

/// Owns the request client and the logger of one SDK instance
pub struct MobileCore {
    config: Config,
    client: RestClient,
    logger: Logger,
}

impl MobileCore {
    /// Build the reqwest transport, open the shard directory and start both queues
    pub async fn new(config: Config, mappers: MapperChain) -> Result<Self> {
        config.validate().map_err(CoreError::Config)?;

        let transport = Arc::new(HttpTransport::new(
            config.base_url.clone(),
            &config.user_agent,
        )?);
        let client = RestClient::new(
            Arc::new(config.client_config(mappers)),
            transport,
            config.dispatch_workers,
        );

        let repository = Arc::new(FileShardRepository::open(&config.shard_dir).await?);
        let logger = Logger::builder(repository).workers(config.log_workers).build();

        info!(
            "Mobile core ready - base url: {:?}, shard dir: {}, dispatch workers: {}, log workers: {}",
            config.base_url,
            config.shard_dir.display(),
            config.dispatch_workers,
            config.log_workers
        );

        Ok(Self {
            config,
            client,
            logger,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Execute a request and record its outcome as a `log_request` shard
    pub fn execute_logged(&self, request: RequestModel, proxy: Box<dyn CompletionProxy>) {
        let proxy = LoggingCompletionProxy::new(self.logger.clone(), &request, proxy);
        self.client.execute(request, Box::new(proxy));
    }

    pub fn metrics(&self) -> DispatchMetricsSnapshot {
        self.client.metrics()
    }

    /// Drain requests first since their completions may still log
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.client.shutdown().await;
        self.logger.shutdown().await;
        info!("Mobile core shutdown complete");
    }
}
