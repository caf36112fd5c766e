use crate::rss_utils::url::is_fetchable;
use crate::types::{AggregatorError, ProxyConfig};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, LOCATION, REFERER};
use reqwest::{redirect, Client};
use std::collections::HashSet;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Served in place of any image that cannot be fetched safely.
pub const PLACEHOLDER_SVG: &str = concat!(
    "<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 800 450'>",
    "<rect width='800' height='450' fill='rgb(15,23,42)'/>",
    "<rect x='340' y='170' rx='12' ry='12' width='120' height='100' fill='rgba(96,165,250,0.15)' stroke='rgb(96,165,250)' stroke-width='8'/>",
    "<path d='M360 170 v-20 a40 40 0 0 1 80 0 v20' fill='none' stroke='rgb(147,197,253)' stroke-width='8'/>",
    "<text x='400' y='320' font-size='28' fill='rgb(203,213,225)' text-anchor='middle' font-family='Segoe UI,Roboto,Arial,sans-serif'>Cyber Security</text>",
    "</svg>"
);
pub const PLACEHOLDER_CONTENT_TYPE: &str = "image/svg+xml";
pub const IMAGE_CACHE_CONTROL: &str = "public, max-age=86400";
pub const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("redirect loop at {0}")]
    RedirectLoop(String),

    #[error("redirect budget exhausted")]
    TooManyRedirects,

    #[error("upstream returned HTTP {0}")]
    UpstreamStatus(u16),

    #[error("upstream content-type {0:?} is not an image")]
    NotAnImage(String),

    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream request failed: {0}")]
    Transport(String),
}

impl ProxyError {
    /// Loops are reported to the client; every other failure becomes the placeholder.
    pub fn is_redirect_loop(&self) -> bool {
        matches!(self, ProxyError::RedirectLoop(_))
    }
}

/// What one upstream hop returned, before the proxy decides what to do with it.
pub struct UpstreamResponse {
    pub status: u16,
    pub location: Option<String>,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

pub struct ProxiedImage {
    pub content_type: String,
    pub body: ByteStream,
}

/// A single non-following GET against an upstream image host.
#[async_trait]
pub trait ImageUpstream: Send + Sync {
    async fn get(&self, url: &Url) -> Result<UpstreamResponse, ProxyError>;
}

/// reqwest-backed upstream. Redirects are never followed here; the proxy
/// loop handles them so every hop is checked.
pub struct HttpUpstream {
    client: Client,
}

impl HttpUpstream {
    pub fn new(config: &ProxyConfig) -> Result<Self, AggregatorError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(redirect::Policy::none())
            .connect_timeout(config.hop_timeout)
            .read_timeout(config.hop_timeout)
            .build()?;
        Ok(Self { client })
    }
}

/// Accept and Referer headers sent with every hop.
pub fn upstream_headers(url: &Url) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(IMAGE_ACCEPT));
    if let Ok(origin) = HeaderValue::from_str(&url.origin().ascii_serialization()) {
        headers.insert(REFERER, origin);
    }
    headers
}

#[async_trait]
impl ImageUpstream for HttpUpstream {
    async fn get(&self, url: &Url) -> Result<UpstreamResponse, ProxyError> {
        let response = self
            .client
            .get(url.clone())
            .headers(upstream_headers(url))
            .send()
            .await
            .map_err(|e| ProxyError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let location = header_string(response.headers(), LOCATION);
        let content_type = header_string(response.headers(), CONTENT_TYPE);

        Ok(UpstreamResponse {
            status,
            location,
            content_type,
            body: Box::pin(response.bytes_stream().map_err(io::Error::other)),
        })
    }
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Per-request redirect bookkeeping. Owned by one proxy call and dropped with it.
#[derive(Debug)]
pub struct ProxyRequestState {
    pub current: Url,
    visited: HashSet<String>,
    redirects_remaining: u32,
}

impl ProxyRequestState {
    pub fn new(target: Url, max_redirects: u32) -> Self {
        let mut visited = HashSet::new();
        visited.insert(target.as_str().to_string());
        Self {
            current: target,
            visited,
            redirects_remaining: max_redirects,
        }
    }

    pub fn redirects_remaining(&self) -> u32 {
        self.redirects_remaining
    }

    /// Move to the next hop. Loop detection takes precedence over the budget.
    pub fn follow(&mut self, next: Url) -> Result<(), ProxyError> {
        let key = next.as_str().to_string();
        if self.visited.contains(&key) {
            return Err(ProxyError::RedirectLoop(key));
        }
        if self.redirects_remaining == 0 {
            return Err(ProxyError::TooManyRedirects);
        }
        if !is_fetchable(&next) {
            return Err(ProxyError::UnsupportedScheme(next.scheme().to_string()));
        }

        self.redirects_remaining -= 1;
        self.visited.insert(key);
        self.current = next;
        Ok(())
    }
}

/// Parse a client-supplied target; only absolute http(s) URLs pass.
pub fn validate_target(src: &str) -> Result<Url, ProxyError> {
    let url = Url::parse(src.trim())?;
    if !is_fetchable(&url) {
        return Err(ProxyError::UnsupportedScheme(url.scheme().to_string()));
    }
    Ok(url)
}

/// Fetches images on behalf of clients, following redirects one checked hop at a time.
pub struct ImageProxy {
    upstream: Arc<dyn ImageUpstream>,
    config: ProxyConfig,
}

impl ImageProxy {
    pub fn new(upstream: Arc<dyn ImageUpstream>, config: ProxyConfig) -> Self {
        Self { upstream, config }
    }

    pub fn http(config: ProxyConfig) -> Result<Self, AggregatorError> {
        let upstream = Arc::new(HttpUpstream::new(&config)?);
        Ok(Self::new(upstream, config))
    }

    pub async fn fetch(&self, src: &str) -> Result<ProxiedImage, ProxyError> {
        let target = validate_target(src)?;
        let mut state = ProxyRequestState::new(target, self.config.max_redirects);

        loop {
            let response = self.fetch_hop(&state.current).await?;

            if (300..400).contains(&response.status) {
                if let Some(location) = response.location.as_deref() {
                    let next = state.current.join(location)?;
                    debug!("Following redirect {} -> {}", state.current, next);
                    if let Err(e) = state.follow(next) {
                        if e.is_redirect_loop() {
                            warn!("Redirect loop while proxying {}: {}", src, e);
                        }
                        return Err(e);
                    }
                    // the redirect body is dropped unread
                    continue;
                }
            }

            if response.status >= 400 {
                return Err(ProxyError::UpstreamStatus(response.status));
            }

            let content_type = response.content_type.unwrap_or_default();
            if !content_type.trim().to_ascii_lowercase().starts_with("image/") {
                return Err(ProxyError::NotAnImage(content_type));
            }

            return Ok(ProxiedImage {
                content_type,
                body: idle_limited(response.body, self.config.hop_timeout),
            });
        }
    }

    async fn fetch_hop(&self, url: &Url) -> Result<UpstreamResponse, ProxyError> {
        match tokio::time::timeout(self.config.hop_timeout, self.upstream.get(url)).await {
            Ok(result) => result,
            Err(_) => Err(ProxyError::Timeout(self.config.hop_timeout)),
        }
    }
}

/// Ends the stream with a `TimedOut` error once the upstream sends nothing for `idle`.
pub fn idle_limited(body: ByteStream, idle: Duration) -> ByteStream {
    Box::pin(futures::stream::unfold(Some(body), move |body| async move {
        let Some(mut body) = body else {
            return None;
        };
        match tokio::time::timeout(idle, body.next()).await {
            Ok(Some(chunk)) => Some((chunk, Some(body))),
            Ok(None) => None,
            Err(_) => {
                let stalled = io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("upstream body idle for {:?}", idle),
                );
                Some((Err(stalled), None))
            }
        }
    }))
}
