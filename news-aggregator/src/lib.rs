pub mod aggregator;
pub mod cache;
pub mod config;
pub mod fetcher;
pub mod image_resolver;
pub mod parser;
pub mod proxy;
pub mod rss_utils;
pub mod sources;
pub mod traits;
pub mod types;
pub mod web;

pub use aggregator::NewsAggregator;
pub use cache::{Clock, NewsCache, Refresh, SystemClock};
pub use config::ServerConfig;
pub use fetcher::Fetcher;
pub use image_resolver::ImageResolver;
pub use parser::FeedParser;
pub use proxy::{ImageProxy, ImageUpstream, ProxyError};
pub use sources::{RssFeedSource, SourceRegistry};
pub use traits::PullFeed;
pub use types::*;
