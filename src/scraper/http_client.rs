use crate::config::CrawlerConfig;
use crate::error::CrawlError;
use async_trait::async_trait;
use rand::Rng;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;
use url::Url;

// ── Rendered page ─────────────────────────────────────────────────────────────

/// HTML of a rendered page plus the URL it was fetched from.
///
/// Kept as text so it can cross `.await` points; parse with
/// [`DomSnapshot::document`] inside synchronous code.
#[derive(Debug, Clone)]
pub struct DomSnapshot {
    url: String,
    html: String,
}

impl DomSnapshot {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }

    pub fn contains(&self, selector: &Selector) -> bool {
        self.document().select(selector).next().is_some()
    }
}

// ── Rendering capability ──────────────────────────────────────────────────────

/// One stateful browsing session (cookies, referrer). Never shared between
/// concurrent passes; released when dropped.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn render(&self, url: &str) -> Result<DomSnapshot, CrawlError>;
}

/// Hands out fresh sessions, one per search pass.
pub trait Browser: Send + Sync {
    fn open_session(&self) -> Result<Box<dyn BrowserSession>, CrawlError>;
}

// ── Per-domain throttle ───────────────────────────────────────────────────────

/// Spaces requests to the same domain by `min_interval` plus random jitter.
/// Shared through an `Arc` by every session and enricher.
pub struct Throttle {
    min_interval: Duration,
    jitter: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration, jitter: Duration) -> Self {
        Self {
            min_interval,
            jitter,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.request_delay_ms),
            Duration::from_millis(config.jitter_ms),
        )
    }

    pub async fn wait(&self, domain: &str) {
        let delay = self.reserve(domain);
        if !delay.is_zero() {
            debug!("throttle {}: sleeping {:?}", domain, delay);
            sleep(delay).await;
        }
    }

    pub async fn wait_for_url(&self, url: &str) {
        let domain = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        self.wait(&domain).await;
    }

    /// Book the next slot for `domain` and return how long to wait for it.
    fn reserve(&self, domain: &str) -> Duration {
        let jitter = match self.jitter.as_millis() as u64 {
            0 => Duration::ZERO,
            ms => Duration::from_millis(rand::rng().random_range(0..=ms)),
        };

        let now = Instant::now();
        let mut slots = self.next_slot.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = match slots.get(domain) {
            Some(prev) => (*prev + self.min_interval + jitter).max(now),
            None => now,
        };
        slots.insert(domain.to_string(), slot);
        slot.saturating_duration_since(now)
    }
}

// ── HTTP-backed browser ───────────────────────────────────────────────────────

pub struct HttpBrowser {
    user_agent: String,
    timeout: Duration,
    throttle: Arc<Throttle>,
    opened: AtomicU64,
}

impl HttpBrowser {
    pub fn new(config: &CrawlerConfig, throttle: Arc<Throttle>) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            throttle,
            opened: AtomicU64::new(0),
        }
    }
}

impl Browser for HttpBrowser {
    fn open_session(&self) -> Result<Box<dyn BrowserSession>, CrawlError> {
        let client = reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .gzip(true)
            // Search pages hand out session cookies on first visit
            .cookie_store(true)
            .build()?;

        let id = self.opened.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("session #{} opened", id);

        Ok(Box::new(HttpSession {
            id,
            client,
            throttle: Arc::clone(&self.throttle),
        }))
    }
}

struct HttpSession {
    id: u64,
    client: reqwest::Client,
    throttle: Arc<Throttle>,
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn render(&self, url: &str) -> Result<DomSnapshot, CrawlError> {
        self.throttle.wait_for_url(url).await;
        debug!("session #{} GET {}", self.id, url);

        let resp = self.client.get(url).send().await?.error_for_status()?;
        let final_url = resp.url().to_string();
        let html = resp.text().await?;
        Ok(DomSnapshot::new(final_url, html))
    }
}

impl Drop for HttpSession {
    fn drop(&mut self) {
        debug!("session #{} released", self.id);
    }
}
