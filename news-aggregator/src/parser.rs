use crate::types::{AggregatorError, Enclosure, RawEntry, Result};
use feed_rs::model::Entry;
use feed_rs::parser;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

static RSS_ENCLOSURE_URL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)<enclosure\b[^>]*?\burl\s*=\s*["']([^"']+)["']"#).ok());

/// Turns an RSS/Atom/JSON feed document into `RawEntry` values.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses raw document bytes, so the XML encoding declaration is honoured.
    pub fn parse_feed(&self, content: impl AsRef<[u8]>) -> Result<Vec<RawEntry>> {
        let content = content.as_ref();
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content)
            .map_err(|e| AggregatorError::Parse(format!("Failed to parse feed: {}", e)))?;

        let enclosure_urls = rss_enclosure_urls(content);
        let entries: Vec<RawEntry> = feed
            .entries
            .into_iter()
            .map(|entry| Self::parse_entry(entry, &enclosure_urls))
            .collect();
        debug!("Parsed feed with {} entries", entries.len());
        Ok(entries)
    }

    fn parse_entry(entry: Entry, enclosure_urls: &HashSet<Url>) -> RawEntry {
        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.clone())
            .filter(|t| !t.trim().is_empty());

        let link = entry
            .links
            .iter()
            .find(|l| l.rel.as_deref().map_or(true, |rel| rel.eq_ignore_ascii_case("alternate")))
            .or_else(|| entry.links.first())
            .map(|l| l.href.clone());

        let enclosure = Self::find_enclosure(&entry, enclosure_urls);
        let media = Self::media_urls(&entry);

        let summary = entry.summary.map(|s| s.content);
        let content = entry.content.and_then(|c| c.body);

        RawEntry {
            title,
            link,
            published: entry.published,
            updated: entry.updated,
            summary,
            content,
            enclosure,
            media,
        }
    }

    /// Atom carries enclosures as `rel="enclosure"` links. feed-rs folds RSS
    /// `<enclosure>` into the media list, so a media item only counts as the
    /// enclosure when the document has an `<enclosure>` element with its URL.
    /// Plain media:content stays a media reference.
    fn find_enclosure(entry: &Entry, enclosure_urls: &HashSet<Url>) -> Option<Enclosure> {
        let from_link = entry
            .links
            .iter()
            .find(|l| l.rel.as_deref().is_some_and(|rel| rel.eq_ignore_ascii_case("enclosure")))
            .map(|l| Enclosure {
                url: l.href.clone(),
                mime_type: l.media_type.clone(),
            });

        from_link.or_else(|| {
            entry
                .media
                .iter()
                .flat_map(|m| m.content.iter())
                .find_map(|c| {
                    let url = c.url.as_ref().filter(|u| enclosure_urls.contains(*u))?;
                    Some(Enclosure {
                        url: url.to_string(),
                        mime_type: c.content_type.as_ref().map(|m| m.to_string()),
                    })
                })
        })
    }

    /// media:content URLs in document order; thumbnails only when there is no media:content.
    fn media_urls(entry: &Entry) -> Vec<String> {
        let content: Vec<String> = entry
            .media
            .iter()
            .flat_map(|m| m.content.iter())
            .filter_map(|c| c.url.as_ref().map(|u| u.to_string()))
            .collect();

        if !content.is_empty() {
            return content;
        }

        entry
            .media
            .iter()
            .flat_map(|m| m.thumbnails.iter())
            .map(|t| t.image.uri.clone())
            .collect()
    }
}

/// URLs of every RSS `<enclosure>` element in the raw document.
fn rss_enclosure_urls(content: &[u8]) -> HashSet<Url> {
    let Some(pattern) = RSS_ENCLOSURE_URL.as_ref() else {
        return HashSet::new();
    };
    let text = String::from_utf8_lossy(content);
    pattern
        .captures_iter(&text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| Url::parse(&m.as_str().trim().replace("&amp;", "&")).ok())
        .collect()
}
