use crate::types::{FeedSource, RawEntry, Result};
use async_trait::async_trait;

/// Trait for pulling raw entries from one content source
#[async_trait]
pub trait PullFeed: Send + Sync {
    /// The registry entry this puller serves; its name labels every item
    fn source(&self) -> &FeedSource;

    /// Human-readable name for this source
    fn source_name(&self) -> &str {
        &self.source().name
    }

    /// Fetch and parse the source's current entries
    async fn pull(&self) -> Result<Vec<RawEntry>>;
}
