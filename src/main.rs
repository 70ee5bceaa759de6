//! Command-line driver: executes one request through the core and records it as a shard

use clap::Parser;
use mobile_core::config::parse_header_list;
use mobile_core::log_entry::MessageEntry;
use mobile_core::mapper::HeaderMapper;
use mobile_core::{
    ChannelCompletionProxy, Config, CoreError, HttpMethod, LogLevel, MapperChain, MobileCore,
    RequestModel, Result,
};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "mobile-core", version, about = "Dispatch a request and log its outcome as a shard")]
struct Cli {
    /// Endpoint, absolute or relative to CORE_BASE_URL
    endpoint: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Extra headers added by a mapper, as `Name=value,Other=value`
    #[arg(short = 'H', long)]
    headers: Option<String>,

    /// JSON request body
    #[arg(short, long)]
    data: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();

    let cli = Cli::parse();

    info!("Starting mobile core v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    let mut mappers = MapperChain::new();
    if let Some(headers) = &cli.headers {
        mappers = mappers.with(HeaderMapper::new(parse_header_list(headers)));
    }

    let core = MobileCore::new(config, mappers).await?;

    let mut builder = RequestModel::builder(cli.endpoint.as_str()).method(cli.method.parse::<HttpMethod>()?);
    if let Some(data) = &cli.data {
        builder = builder.json(serde_json::from_str(data).map_err(CoreError::Json)?);
    }
    if let Some(seconds) = cli.timeout {
        builder = builder.timeout(Duration::from_secs(seconds));
    }
    let request = builder.build()?;

    let (proxy, pending) = ChannelCompletionProxy::new();
    core.execute_logged(request, Box::new(proxy));

    let outcome = pending.wait().await;
    match &outcome {
        Ok(response) => {
            info!("Request succeeded with status {}", response.status_code);
            println!("{}", response.text());
        }
        Err(e) => {
            error!("Request failed ({}): {}", e.kind(), e);
            core.logger().log(
                &MessageEntry::new(e.to_string()).with_attribute("kind", e.kind()),
                LogLevel::Warn,
            );
        }
    }

    core.shutdown().await;

    if outcome.is_err() {
        std::process::exit(2);
    }
    Ok(())
}

/// Initialize structured logging
fn initialize_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
