use crate::types::{AggregatorError, FetchConfig, Result};
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, info};

/// HTTP side of feed retrieval. One attempt per call; the next cache refresh is the retry.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, config })
    }

    /// Raw feed bytes. The size cap holds whether or not the server sends a Content-Length.
    pub async fn fetch_feed(&self, url: &str) -> Result<Vec<u8>> {
        let start_time = Instant::now();
        debug!("Fetching feed: {}", url);

        let mut response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(AggregatorError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let limit = self.config.max_feed_size_mb.saturating_mul(1024 * 1024);
        if let Some(content_length) = response.content_length() {
            if content_length > limit as u64 {
                return Err(AggregatorError::FeedTooLarge {
                    size_mb: (content_length / (1024 * 1024)) as usize,
                });
            }
        }

        let mut content = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if content.len() + chunk.len() > limit {
                return Err(AggregatorError::FeedTooLarge {
                    size_mb: (content.len() + chunk.len()) / (1024 * 1024),
                });
            }
            content.extend_from_slice(&chunk);
        }

        info!(
            "Fetched feed: {} ({} bytes in {}ms)",
            url,
            content.len(),
            start_time.elapsed().as_millis()
        );
        Ok(content)
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}
