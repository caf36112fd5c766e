use crate::rss_utils::url::path_extension;
use crate::types::RawEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

/// Used when no strategy finds an image for an entry.
pub const FALLBACK_IMAGE_URL: &str =
    "https://source.unsplash.com/featured/800x450?cyber,security,hacking,news";

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "svg"];

static IMG_SRC: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"'>]+)["']"#).ok());

/// An extraction strategy either finds an image URL or yields nothing.
pub type Strategy = fn(&RawEntry) -> Option<String>;

/// Picks a representative image for a feed entry by trying strategies in order.
pub struct ImageResolver {
    strategies: Vec<(&'static str, Strategy)>,
}

impl Default for ImageResolver {
    fn default() -> Self {
        Self::new(vec![
            ("enclosure", from_enclosure as Strategy),
            ("media", from_media as Strategy),
            ("embedded-html", from_embedded_html as Strategy),
        ])
    }
}

impl ImageResolver {
    pub fn new(strategies: Vec<(&'static str, Strategy)>) -> Self {
        Self { strategies }
    }

    /// First strategy with a result wins; never fails.
    pub fn resolve(&self, entry: &RawEntry) -> String {
        self.strategies
            .iter()
            .find_map(|(name, strategy)| {
                let found = strategy(entry)?;
                trace!("Image resolved via {}: {}", name, found);
                Some(found)
            })
            .unwrap_or_else(|| FALLBACK_IMAGE_URL.to_string())
    }
}

pub fn has_image_extension(url: &str) -> bool {
    path_extension(url).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Explicit enclosure with an image MIME type or an image file extension.
pub fn from_enclosure(entry: &RawEntry) -> Option<String> {
    let enclosure = entry.enclosure.as_ref()?;
    let url = enclosure.url.trim();
    if url.is_empty() {
        return None;
    }

    let declared_image = enclosure
        .mime_type
        .as_deref()
        .is_some_and(|t| t.trim().to_ascii_lowercase().starts_with("image"));

    if declared_image || has_image_extension(url) {
        Some(url.to_string())
    } else {
        None
    }
}

/// First media:content / media:thumbnail URL that looks like an image file.
pub fn from_media(entry: &RawEntry) -> Option<String> {
    entry
        .media
        .iter()
        .map(|url| url.trim())
        .find(|url| !url.is_empty() && has_image_extension(url))
        .map(str::to_string)
}

/// First `<img src>` in the full content, or in the summary when there is no content.
pub fn from_embedded_html(entry: &RawEntry) -> Option<String> {
    let html = entry
        .content
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .or(entry.summary.as_deref())?;

    IMG_SRC
        .as_ref()?
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|url| !url.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Enclosure;

    fn enclosure(url: &str, mime: Option<&str>) -> Option<Enclosure> {
        Some(Enclosure {
            url: url.to_string(),
            mime_type: mime.map(str::to_string),
        })
    }

    #[test]
    fn enclosure_beats_embedded_html() {
        let entry = RawEntry {
            enclosure: enclosure("https://x/a.png", Some("image/png")),
            content: Some(r#"<img src="https://x/b.jpg">"#.to_string()),
            ..Default::default()
        };
        assert_eq!(ImageResolver::default().resolve(&entry), "https://x/a.png");
    }

    #[test]
    fn enclosure_by_extension_without_type() {
        let entry = RawEntry {
            enclosure: enclosure("https://x/photo.JPG?size=large", None),
            ..Default::default()
        };
        assert_eq!(from_enclosure(&entry).as_deref(), Some("https://x/photo.JPG?size=large"));
    }

    #[test]
    fn non_image_enclosure_is_skipped() {
        let entry = RawEntry {
            enclosure: enclosure("https://x/episode.mp3", Some("audio/mpeg")),
            media: vec!["https://x/cover.webp".to_string()],
            ..Default::default()
        };
        assert_eq!(ImageResolver::default().resolve(&entry), "https://x/cover.webp");
    }

    #[test]
    fn media_scanned_in_order() {
        let entry = RawEntry {
            media: vec![
                "https://x/video.mp4".to_string(),
                "https://x/first.gif".to_string(),
                "https://x/second.png".to_string(),
            ],
            ..Default::default()
        };
        assert_eq!(from_media(&entry).as_deref(), Some("https://x/first.gif"));
    }

    #[test]
    fn embedded_img_accepted_regardless_of_extension() {
        let entry = RawEntry {
            content: Some(r#"<p><img src="https://cdn.example/pic.webp"></p>"#.to_string()),
            ..Default::default()
        };
        assert_eq!(ImageResolver::default().resolve(&entry), "https://cdn.example/pic.webp");

        let entry = RawEntry {
            summary: Some(r#"<IMG class='hero' SRC='https://cdn.example/render?id=7'>"#.to_string()),
            ..Default::default()
        };
        assert_eq!(from_embedded_html(&entry).as_deref(), Some("https://cdn.example/render?id=7"));
    }

    #[test]
    fn first_img_wins() {
        let entry = RawEntry {
            content: Some(r#"<img src="https://x/1.png"><img src="https://x/2.png">"#.to_string()),
            ..Default::default()
        };
        assert_eq!(from_embedded_html(&entry).as_deref(), Some("https://x/1.png"));
    }

    #[test]
    fn nothing_matches_gives_fallback() {
        let entry = RawEntry {
            title: Some("Plain text advisory".to_string()),
            summary: Some("No pictures here".to_string()),
            ..Default::default()
        };
        assert_eq!(ImageResolver::default().resolve(&entry), FALLBACK_IMAGE_URL);
    }

    #[test]
    fn custom_chain_order_is_respected() {
        let resolver = ImageResolver::new(vec![
            ("html", from_embedded_html as Strategy),
            ("enclosure", from_enclosure as Strategy),
        ]);
        let entry = RawEntry {
            enclosure: enclosure("https://x/a.png", Some("image/png")),
            content: Some(r#"<img src="https://x/b.jpg">"#.to_string()),
            ..Default::default()
        };
        assert_eq!(resolver.resolve(&entry), "https://x/b.jpg");
    }
}
