use crate::aggregator::NewsAggregator;
use crate::rss_utils::time::should_update;
use crate::types::{CacheEntry, NewsItem};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

pub const DEFAULT_LIMIT: usize = 12;
pub const MAX_LIMIT: usize = 50;

pub fn default_ttl() -> Duration {
    Duration::hours(4)
}

/// Source of "now" for freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Produces a fresh, already sorted item list.
#[async_trait]
pub trait Refresh: Send + Sync {
    async fn refresh(&self) -> Vec<NewsItem>;
}

#[async_trait]
impl Refresh for NewsAggregator {
    async fn refresh(&self) -> Vec<NewsItem> {
        self.aggregate().await
    }
}

/// Clamp a requested page size into `[1, MAX_LIMIT]`, defaulting to `DEFAULT_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> usize {
    match limit {
        None => DEFAULT_LIMIT,
        Some(n) => n.clamp(1, MAX_LIMIT as i64) as usize,
    }
}

struct Slot {
    entry: Arc<CacheEntry>,
    generation: u64,
}

/// Process-wide store of the last aggregation result.
///
/// Readers share the current `CacheEntry` through an `Arc`; a refresh swaps in
/// a new one in a single assignment. Refreshes are serialised: a caller that
/// queued behind another caller's refresh reuses that result.
pub struct NewsCache {
    refresher: Arc<dyn Refresh>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    slot: RwLock<Option<Slot>>,
    refresh_lock: Mutex<()>,
}

impl NewsCache {
    pub fn new(refresher: Arc<dyn Refresh>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            refresher,
            clock,
            ttl,
            slot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_system_clock(refresher: Arc<dyn Refresh>, ttl: Duration) -> Self {
        Self::new(refresher, Arc::new(SystemClock), ttl)
    }

    /// Up to `limit` items, newest first. Refreshes first when forced, empty or stale.
    pub async fn get(&self, limit: usize, force_refresh: bool) -> Vec<NewsItem> {
        let limit = limit.clamp(1, MAX_LIMIT);

        let seen_generation = match self.current().await {
            Some((entry, generation)) => {
                if !force_refresh && self.is_fresh(&entry) {
                    debug!("Serving {} cached items", entry.items.len().min(limit));
                    return truncated(&entry, limit);
                }
                Some(generation)
            }
            None => None,
        };

        let entry = self.refresh(seen_generation, force_refresh).await;
        truncated(&entry, limit)
    }

    /// The stored entry, if any. Never triggers a refresh.
    pub async fn snapshot(&self) -> Option<Arc<CacheEntry>> {
        self.current().await.map(|(entry, _)| entry)
    }

    async fn current(&self) -> Option<(Arc<CacheEntry>, u64)> {
        self.slot
            .read()
            .await
            .as_ref()
            .map(|slot| (slot.entry.clone(), slot.generation))
    }

    /// An empty result is never considered fresh, so a total outage is retried.
    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        !entry.items.is_empty() && !should_update(Some(entry.fetched_at), self.clock.now(), self.ttl)
    }

    async fn refresh(&self, seen_generation: Option<u64>, force_refresh: bool) -> Arc<CacheEntry> {
        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some((entry, generation)) = self.current().await {
            let refreshed_meanwhile = seen_generation != Some(generation);
            if refreshed_meanwhile && (force_refresh || self.is_fresh(&entry)) {
                debug!("Reusing refresh completed by a concurrent request");
                return entry;
            }
        }

        let fetched_at = self.clock.now();
        let items = self.refresher.refresh().await;
        info!("News cache refreshed with {} items", items.len());

        let entry = Arc::new(CacheEntry { items, fetched_at });
        let mut slot = self.slot.write().await;
        let generation = slot.as_ref().map_or(0, |s| s.generation + 1);
        *slot = Some(Slot {
            entry: entry.clone(),
            generation,
        });
        entry
    }
}

fn truncated(entry: &CacheEntry, limit: usize) -> Vec<NewsItem> {
    entry.items.iter().take(limit).cloned().collect()
}
