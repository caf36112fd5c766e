/// Helpers shared by the feed pipeline and the image proxy

/// URL utilities
pub mod url {
    use url::Url;

    /// Only plain web URLs may be fetched on a client's behalf.
    pub fn is_fetchable(url: &Url) -> bool {
        url.scheme() == "http" || url.scheme() == "https"
    }

    /// Lower-cased extension of the last path segment, ignoring query and fragment.
    pub fn path_extension(url_str: &str) -> Option<String> {
        let without_query = url_str.split(['?', '#']).next().unwrap_or("");
        let last_segment = without_query.rsplit('/').next()?;
        let (_, ext) = last_segment.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }
}

/// Time utilities for cache freshness
pub mod time {
    use chrono::{DateTime, Duration, Utc};

    /// True once `ttl` has elapsed since `last_update`, or if there never was one.
    pub fn should_update(last_update: Option<DateTime<Utc>>, now: DateTime<Utc>, ttl: Duration) -> bool {
        match last_update {
            None => true,
            Some(last) => now.signed_duration_since(last) >= ttl,
        }
    }
}

/// Feed text utilities
pub mod feed {
    /// Extract clean text content from HTML
    pub fn extract_text_from_html(html: &str) -> String {
        let text = html
            .chars()
            .fold((String::new(), false), |(mut text, in_tag), c| match c {
                '<' => (text, true),
                '>' => {
                    // keep words on either side of a tag apart
                    text.push(' ');
                    (text, false)
                }
                _ if !in_tag => {
                    text.push(c);
                    (text, in_tag)
                }
                _ => (text, in_tag),
            })
            .0;

        decode_entities(&text)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn decode_entities(text: &str) -> String {
        text.replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&#8217;", "\u{2019}")
            .replace("&amp;", "&")
    }
}
