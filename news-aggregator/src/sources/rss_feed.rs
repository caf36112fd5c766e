use crate::traits::PullFeed;
use crate::types::{FeedSource, RawEntry, Result};
use crate::{FeedParser, Fetcher};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Generic RSS/Atom feed source
pub struct RssFeedSource {
    source: FeedSource,
    fetcher: Arc<Fetcher>,
    parser: FeedParser,
}

impl RssFeedSource {
    pub fn new(source: FeedSource, fetcher: Arc<Fetcher>) -> Self {
        Self {
            source,
            fetcher,
            parser: FeedParser::new(),
        }
    }
}

#[async_trait]
impl PullFeed for RssFeedSource {
    fn source(&self) -> &FeedSource {
        &self.source
    }

    async fn pull(&self) -> Result<Vec<RawEntry>> {
        info!("Pulling feed: {} ({})", self.source.name, self.source.url);

        let content = self.fetcher.fetch_feed(&self.source.url).await?;
        let entries = self.parser.parse_feed(&content)?;

        info!("Pulled {} entries from {}", entries.len(), self.source.name);
        Ok(entries)
    }
}
