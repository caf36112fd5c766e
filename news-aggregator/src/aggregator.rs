use crate::image_resolver::ImageResolver;
use crate::rss_utils::feed::extract_text_from_html;
use crate::traits::PullFeed;
use crate::types::{AggregatorError, NewsItem, RawEntry};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const UNTITLED: &str = "(no title)";

/// Fans out over every source and merges the results into one newest-first list.
/// Holds no state between runs.
pub struct NewsAggregator {
    sources: Vec<Arc<dyn PullFeed>>,
    resolver: ImageResolver,
    fetch_timeout: Duration,
}

impl NewsAggregator {
    pub fn new(sources: Vec<Arc<dyn PullFeed>>, fetch_timeout: Duration) -> Self {
        Self {
            sources,
            resolver: ImageResolver::default(),
            fetch_timeout,
        }
    }

    pub fn with_resolver(mut self, resolver: ImageResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub async fn aggregate(&self) -> Vec<NewsItem> {
        let total_sources = self.sources.len();
        info!("Aggregating {} sources", total_sources);

        let results = join_all(self.sources.iter().map(|source| self.fetch_source(source.as_ref()))).await;

        let mut successful_sources = 0;
        let mut items = Vec::new();
        for (source, entries) in self.sources.iter().zip(results) {
            let Some(entries) = entries else { continue };
            successful_sources += 1;
            items.extend(
                entries
                    .into_iter()
                    .map(|entry| to_news_item(source.source_name(), entry, &self.resolver)),
            );
        }

        sort_newest_first(&mut items);

        info!(
            "Fetched {} items from {}/{} sources",
            items.len(),
            successful_sources,
            total_sources
        );
        items
    }

    /// `None` when the source failed or timed out; the failure stays local.
    async fn fetch_source(&self, source: &dyn PullFeed) -> Option<Vec<RawEntry>> {
        let outcome = match tokio::time::timeout(self.fetch_timeout, source.pull()).await {
            Ok(result) => result,
            Err(_) => Err(AggregatorError::Timeout {
                seconds: self.fetch_timeout.as_secs(),
                url: source.source().url.clone(),
            }),
        };

        match outcome {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!("Skipping source {}: {}", source.source_name(), e);
                None
            }
        }
    }
}

pub fn to_news_item(source_name: &str, entry: RawEntry, resolver: &ImageResolver) -> NewsItem {
    let image_url = resolver.resolve(&entry);

    let summary = [entry.summary.as_deref(), entry.content.as_deref()]
        .into_iter()
        .flatten()
        .map(extract_text_from_html)
        .find(|text| !text.is_empty())
        .unwrap_or_default();

    NewsItem {
        title: entry
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string()),
        link: entry.link.unwrap_or_default(),
        source: source_name.to_string(),
        published_at: entry.published.or(entry.updated),
        summary,
        image_url,
    }
}

/// Descending by `published_at`; undated items sort last. Stable for ties.
pub fn sort_newest_first(items: &mut [NewsItem]) {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}
