#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use interfaces::{ScanError, ScanRequest, ScanVerdict, Scanner};
use news_aggregator::proxy::{ImageUpstream, ProxyError, UpstreamResponse};
use news_aggregator::{
    AggregatorError, Clock, FeedSource, NewsItem, PullFeed, RawEntry, Refresh, Result,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
}

pub fn entry(title: &str, published: Option<DateTime<Utc>>) -> RawEntry {
    RawEntry {
        title: Some(title.to_string()),
        link: Some(format!("https://news.example/{}", title.replace(' ', "-"))),
        published,
        ..Default::default()
    }
}

pub fn news_item(title: &str) -> NewsItem {
    NewsItem {
        title: title.to_string(),
        link: format!("https://news.example/{}", title),
        source: "Fake".to_string(),
        published_at: None,
        summary: String::new(),
        image_url: String::new(),
    }
}

pub enum Behaviour {
    Entries(Vec<RawEntry>),
    Fail,
    Hang,
}

/// In-memory feed with a scripted outcome.
pub struct ScriptedFeed {
    source: FeedSource,
    behaviour: Behaviour,
    pub pulls: AtomicUsize,
}

impl ScriptedFeed {
    pub fn new(name: &str, behaviour: Behaviour) -> Self {
        Self {
            source: FeedSource::new(name, format!("https://{}.example/feed", name.to_lowercase())),
            behaviour,
            pulls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PullFeed for ScriptedFeed {
    fn source(&self) -> &FeedSource {
        &self.source
    }

    async fn pull(&self) -> Result<Vec<RawEntry>> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Entries(entries) => Ok(entries.clone()),
            Behaviour::Fail => Err(AggregatorError::Parse("broken feed".to_string())),
            Behaviour::Hang => {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                Ok(Vec::new())
            }
        }
    }
}

/// Clock the test moves by hand.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Refresher that counts calls and numbers each batch it returns.
pub struct CountingRefresh {
    pub calls: AtomicUsize,
    items_per_refresh: usize,
    delay: std::time::Duration,
}

impl CountingRefresh {
    pub fn new(items_per_refresh: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            items_per_refresh,
            delay: std::time::Duration::ZERO,
        }
    }

    pub fn slow(items_per_refresh: usize, delay: std::time::Duration) -> Self {
        Self {
            delay,
            ..Self::new(items_per_refresh)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Refresh for CountingRefresh {
    async fn refresh(&self) -> Vec<NewsItem> {
        let run = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (0..self.items_per_refresh)
            .map(|i| news_item(&format!("run{}-item{}", run, i)))
            .collect()
    }
}

#[derive(Clone)]
pub enum Hop {
    Redirect(u16, String),
    Status(u16, Option<String>, &'static [u8]),
    TransportError,
    Hang,
    /// Image headers and one chunk, then silence
    Stall(&'static [u8]),
}

/// Upstream keyed by exact URL; unknown URLs answer 404.
#[derive(Default)]
pub struct FakeUpstream {
    hops: HashMap<String, Hop>,
    pub requests: Mutex<Vec<String>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, hop: Hop) -> Self {
        self.hops.insert(url.to_string(), hop);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageUpstream for FakeUpstream {
    async fn get(&self, url: &Url) -> std::result::Result<UpstreamResponse, ProxyError> {
        self.requests.lock().unwrap().push(url.to_string());
        let hop = self
            .hops
            .get(url.as_str())
            .cloned()
            .unwrap_or(Hop::Status(404, Some("text/html".to_string()), b"not found"));

        let body = |bytes: &'static [u8]| {
            Box::pin(futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(bytes))]))
                as news_aggregator::proxy::ByteStream
        };

        match hop {
            Hop::Redirect(status, location) => Ok(UpstreamResponse {
                status,
                location: Some(location),
                content_type: Some("text/html".to_string()),
                body: body(b"moved"),
            }),
            Hop::Status(status, content_type, bytes) => Ok(UpstreamResponse {
                status,
                location: None,
                content_type,
                body: body(bytes),
            }),
            Hop::Stall(first) => Ok(UpstreamResponse {
                status: 200,
                location: None,
                content_type: Some("image/png".to_string()),
                body: Box::pin(
                    futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(first))])
                        .chain(futures::stream::pending()),
                ),
            }),
            Hop::TransportError => Err(ProxyError::Transport("connection reset".to_string())),
            Hop::Hang => {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                Err(ProxyError::Transport("unreachable".to_string()))
            }
        }
    }
}

pub enum ScanScript {
    Verdict(serde_json::Value),
    Fail(&'static str),
    Garbage(&'static str),
}

/// Scanner stand-in that records requests and checks staged files exist.
pub struct FakeScanner {
    script: ScanScript,
    pub requests: Mutex<Vec<(ScanRequest, Option<String>)>>,
}

impl FakeScanner {
    pub fn new(script: ScanScript) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Scanner for FakeScanner {
    async fn scan(&self, request: &ScanRequest) -> std::result::Result<ScanVerdict, ScanError> {
        // Capture staged file contents for URL-less scans
        let staged = std::fs::read_to_string(&request.target).ok();
        self.requests.lock().unwrap().push((request.clone(), staged));

        match &self.script {
            ScanScript::Verdict(serde_json::Value::Object(map)) => Ok(ScanVerdict(map.clone())),
            ScanScript::Verdict(_) => Err(ScanError::InvalidOutput { stdout: String::new() }),
            ScanScript::Fail(stderr) => Err(ScanError::Failed {
                code: Some(1),
                stderr: stderr.to_string(),
            }),
            ScanScript::Garbage(stdout) => Err(ScanError::InvalidOutput {
                stdout: stdout.to_string(),
            }),
        }
    }
}

/// What the local server writes back for one request.
pub struct Reply {
    pub bytes: Vec<u8>,
    /// Keep the socket open after writing instead of closing it
    pub stall: bool,
}

impl Reply {
    pub fn new(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Self {
        let mut head = format!("HTTP/1.1 {}\r\nConnection: close\r\n", status);
        for (name, value) in headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        if !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("content-length")) {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(body);
        Self { bytes, stall: false }
    }

    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }
}

/// Plain HTTP/1.1 server on 127.0.0.1 that records every request head.
pub struct LocalServer {
    pub base: String,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl LocalServer {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let respond = Arc::new(respond);

        let recorded = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let recorded = recorded.clone();
                let respond = respond.clone();
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&buf[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&head).to_string();
                    recorded.lock().unwrap().push(head.clone());

                    let reply = (respond.as_ref())(&head);
                    let _ = socket.write_all(&reply.bytes).await;
                    let _ = socket.flush().await;
                    if reply.stall {
                        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                    }
                });
            }
        });

        Self { base, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

/// Request path from the first line of a request head.
pub fn request_path(head: &str) -> &str {
    head.split_whitespace().nth(1).unwrap_or("/")
}

/// Case-insensitive header lookup in a raw request head.
pub fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}
