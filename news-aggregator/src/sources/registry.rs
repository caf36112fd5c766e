use crate::sources::RssFeedSource;
use crate::traits::PullFeed;
use crate::types::{FeedSource, FetchConfig, Result};
use crate::Fetcher;
use std::sync::Arc;

/// Fixed set of feeds aggregated by the service, loaded once at startup.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<FeedSource>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new(vec![
            FeedSource::new("KrebsOnSecurity", "https://krebsonsecurity.com/feed/"),
            FeedSource::new(
                "The Hacker News",
                "https://thehackernews.com/feeds/posts/default?alt=rss",
            ),
            FeedSource::new("BleepingComputer", "https://www.bleepingcomputer.com/feed/"),
            FeedSource::new(
                "CISA Advisories",
                "https://www.cisa.gov/cybersecurity-advisories/all.xml",
            ),
        ])
    }
}

impl SourceRegistry {
    pub fn new(sources: Vec<FeedSource>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &[FeedSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// One HTTP-backed puller per registered feed, sharing a single client.
    pub fn build_pullers(&self, fetch_config: FetchConfig) -> Result<Vec<Arc<dyn PullFeed>>> {
        let fetcher = Arc::new(Fetcher::new(fetch_config)?);
        Ok(self
            .sources
            .iter()
            .cloned()
            .map(|source| Arc::new(RssFeedSource::new(source, fetcher.clone())) as Arc<dyn PullFeed>)
            .collect())
    }
}
