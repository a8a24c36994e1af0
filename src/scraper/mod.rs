pub mod cleaner;
pub mod enricher;
pub mod http_client;
pub mod identity;
pub mod parsers;

use crate::config::{CrawlerConfig, MarketplaceConfig};
use crate::error::CrawlError;
use crate::models::{KeyFeatures, ProductId};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use self::enricher::Enricher;
use self::http_client::{BrowserSession, Throttle};
use self::identity::IdentityResolver;
use self::parsers::{extract_candidates, wait_for_listing, Extraction, RenderWait, SelectorProfile};

// ── Adapter trait ─────────────────────────────────────────────────────────────

/// Everything the pipeline needs from one storefront.
#[async_trait]
pub trait MarketplaceAdapter: Send + Sync {
    /// Profile key, used in logs ("11st").
    fn name(&self) -> &str;

    /// Row name in `stores` ("11번가").
    fn store_name(&self) -> &str;

    /// Per-marketplace cap on cards read; `None` uses the pipeline default.
    fn max_results(&self) -> Option<usize> {
        None
    }

    /// Load the search page for `keyword` in `session` and read its cards.
    async fn search(
        &self,
        session: &dyn BrowserSession,
        keyword: &str,
        max_results: usize,
    ) -> Result<Extraction, CrawlError>;

    fn resolve_id(&self, link: &str) -> Option<ProductId>;

    /// URL stored as the product's purchase URL.
    fn purchase_url(&self, link: &str) -> String {
        link.to_string()
    }

    async fn enrich(&self, id: &ProductId) -> KeyFeatures;
}

// ── Declarative site adapter ──────────────────────────────────────────────────

/// A marketplace described entirely by configuration and a selector profile.
pub struct SiteAdapter {
    config: MarketplaceConfig,
    profile: SelectorProfile,
    identity: IdentityResolver,
    enricher: Option<Enricher>,
    wait: RenderWait,
}

impl SiteAdapter {
    pub fn new(
        config: MarketplaceConfig,
        profile: SelectorProfile,
        crawler: &CrawlerConfig,
        throttle: Arc<Throttle>,
    ) -> Result<Self, CrawlError> {
        let identity = IdentityResolver::from_config(&config)?;
        let enricher = match config.api_base.as_deref() {
            Some(base) => Some(Enricher::new(
                base,
                &crawler.user_agent,
                Duration::from_secs(crawler.enrich_timeout_secs),
                throttle,
            )?),
            None => None,
        };

        Ok(Self {
            config,
            profile,
            identity,
            enricher,
            wait: RenderWait {
                deadline: Duration::from_secs(crawler.render_deadline_secs),
                poll_interval: Duration::from_millis(crawler.poll_interval_ms),
            },
        })
    }

    /// Search URL with the keyword form-encoded into the `{keyword}` slot.
    fn search_url(&self, keyword: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
        self.config.search_url.replace("{keyword}", &encoded)
    }
}

#[async_trait]
impl MarketplaceAdapter for SiteAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn store_name(&self) -> &str {
        &self.config.store_name
    }

    fn max_results(&self) -> Option<usize> {
        self.config.max_results
    }

    async fn search(
        &self,
        session: &dyn BrowserSession,
        keyword: &str,
        max_results: usize,
    ) -> Result<Extraction, CrawlError> {
        let url = self.search_url(keyword);
        info!("{}: searching {:?} ({})", self.config.name, keyword, url);

        let snapshot = wait_for_listing(session, &url, &self.profile, self.wait).await?;
        let extraction = extract_candidates(&snapshot, &self.profile, max_results);

        debug!(
            "{}: {} cards read, {} dropped",
            self.config.name,
            extraction.candidates.len(),
            extraction.dropped
        );
        Ok(extraction)
    }

    fn resolve_id(&self, link: &str) -> Option<ProductId> {
        self.identity.resolve_id(link)
    }

    /// Ad-click wrappers rotate their tracking parameters on every crawl, so
    /// the unwrapped target is stored instead.
    fn purchase_url(&self, link: &str) -> String {
        self.identity
            .resolution_target(link)
            .unwrap_or_else(|| link.to_string())
    }

    async fn enrich(&self, id: &ProductId) -> KeyFeatures {
        match &self.enricher {
            Some(enricher) => enricher.enrich(id).await,
            None => KeyFeatures::new(),
        }
    }
}
