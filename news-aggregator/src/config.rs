use crate::types::{FetchConfig, ProxyConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const MAX_UPLOAD_MB: u64 = 1024;

/// Runtime settings. Every flag can also be supplied through its environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "news-aggregator", version, about = "Security news aggregation and image proxy service")]
pub struct ServerConfig {
    /// TCP port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Interface to bind
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind: String,

    /// Maximum age of the aggregated news list before it is rebuilt
    #[arg(
        long,
        env = "NEWS_CACHE_TTL_SECS",
        default_value_t = 4 * 60 * 60,
        value_parser = clap::value_parser!(u64).range(1..=MAX_CACHE_TTL_SECS)
    )]
    pub cache_ttl_secs: u64,

    /// Per-feed fetch timeout
    #[arg(long, env = "FEED_TIMEOUT_SECS", default_value_t = 10)]
    pub feed_timeout_secs: u64,

    /// Per-hop timeout of the image proxy
    #[arg(long, env = "PROXY_TIMEOUT_SECS", default_value_t = 10)]
    pub proxy_timeout_secs: u64,

    /// Redirects the image proxy follows before giving up
    #[arg(long, env = "PROXY_MAX_REDIRECTS", default_value_t = 5)]
    pub proxy_max_redirects: u32,

    /// Interpreter used to run the scanner scripts
    #[arg(long, env = "SCANNER_PROGRAM", default_value = "python")]
    pub scanner_program: PathBuf,

    /// Directory holding the scanner scripts
    #[arg(long, env = "SCANNER_DIR", default_value = "scanners")]
    pub scanner_dir: PathBuf,

    /// Kill a scanner that runs longer than this
    #[arg(long, env = "SCAN_TIMEOUT_SECS", default_value_t = 120)]
    pub scan_timeout_secs: u64,

    /// Where uploads are staged while being scanned
    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Request body limit for uploads, in megabytes
    #[arg(
        long,
        env = "MAX_UPLOAD_MB",
        default_value_t = 25,
        value_parser = clap::value_parser!(u64).range(1..=MAX_UPLOAD_MB)
    )]
    pub max_upload_mb: u64,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        i64::try_from(self.cache_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(crate::cache::default_ttl)
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout_seconds: self.feed_timeout_secs,
            ..FetchConfig::default()
        }
    }

    pub fn proxy_config(&self) -> ProxyConfig {
        ProxyConfig {
            hop_timeout: Duration::from_secs(self.proxy_timeout_secs),
            max_redirects: self.proxy_max_redirects,
            ..ProxyConfig::default()
        }
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb
            .checked_mul(1024 * 1024)
            .and_then(|bytes| usize::try_from(bytes).ok())
            .unwrap_or(usize::MAX)
    }
}
