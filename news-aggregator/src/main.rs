use clap::Parser;
use interfaces::ProcessScanner;
use news_aggregator::web::{run_server, AppState};
use news_aggregator::{ImageProxy, NewsAggregator, NewsCache, ServerConfig, SourceRegistry};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::parse();
    info!("Starting news aggregator");

    let registry = SourceRegistry::default();
    info!("Aggregating {} feeds", registry.len());
    for source in registry.sources() {
        info!("  {} -> {}", source.name, source.url);
    }

    let fetch_config = config.fetch_config();
    let fetch_timeout = fetch_config.timeout();
    let aggregator = NewsAggregator::new(registry.build_pullers(fetch_config)?, fetch_timeout);
    let news = NewsCache::with_system_clock(Arc::new(aggregator), config.cache_ttl());

    let proxy = ImageProxy::http(config.proxy_config())?;
    let scanner = ProcessScanner::new(&config.scanner_program, &config.scanner_dir)
        .with_timeout(config.scan_timeout());

    let state = AppState {
        news: Arc::new(news),
        proxy: Arc::new(proxy),
        scanner: Arc::new(scanner),
        upload_dir: config.upload_dir.clone(),
        max_upload_bytes: config.max_upload_bytes(),
        started_at: Instant::now(),
    };

    run_server(state, &config.bind_addr()).await
}
