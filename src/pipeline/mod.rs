//! Pipeline orchestrator: keywords × marketplaces → storage.
//!
//! Each (keyword, marketplace) pass runs to completion before the next:
//!   1. open a browsing session, load the search page, read the cards
//!      (session released as soon as the cards are read, or on failure)
//!   2. per card: parse price → resolve id → enrich (only with an id)
//!      → upsert product → upsert image → append price point
//!
//! A failed page abandons only its own pass. A bad card drops only itself.
//! Every write is idempotent except the price append, so re-running a pass
//! adds one more observation per product and nothing else.

use crate::config::{AppConfig, UnresolvedPolicy};
use crate::error::CrawlError;
use crate::loader::{load_category_rules, load_profiles};
use crate::models::{KeyFeatures, ListingCandidate, NewProduct};
use crate::scraper::cleaner::{parse_price, CategoryRules};
use crate::scraper::http_client::{Browser, HttpBrowser, Throttle};
use crate::scraper::parsers::SelectorProfile;
use crate::scraper::{MarketplaceAdapter, SiteAdapter};
use crate::storage::{ReferenceTable, Repository};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, info_span, warn, Instrument};

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub max_results: usize,
    pub pass_delay: Duration,
    pub unresolved: UnresolvedPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_results: config.pipeline.max_results,
            pass_delay: Duration::from_millis(config.crawler.pass_delay_ms),
            unresolved: config.pipeline.unresolved,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    pub keywords: usize,
    pub passes: usize,
    pub passes_failed: usize,
    pub passes_empty: usize,
    pub candidates_seen: usize,
    pub candidates_dropped: usize,
    pub unresolved_skipped: usize,
    pub products_saved: usize,
    pub prices_recorded: usize,
    pub errors: usize,
}

/// Where a pass is, for debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassStage {
    Searching,
    Extracting,
    Resolving,
    Enriching,
    Persisting,
    Done,
    Failed,
}

#[derive(Debug, PartialEq, Eq)]
enum PassOutcome {
    Empty,
    Done { saved: usize },
}

#[derive(Debug, PartialEq, Eq)]
enum CandidateOutcome {
    Saved,
    Dropped,
    Skipped,
}

pub struct Pipeline {
    settings: PipelineSettings,
    repo: Repository,
    browser: Box<dyn Browser>,
    adapters: Vec<Box<dyn MarketplaceAdapter>>,
    rules: CategoryRules,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        repo: Repository,
        browser: Box<dyn Browser>,
        adapters: Vec<Box<dyn MarketplaceAdapter>>,
        rules: CategoryRules,
    ) -> Self {
        Self {
            settings,
            repo,
            browser,
            adapters,
            rules,
        }
    }

    /// Wire the real store, HTTP browser and configured marketplaces.
    /// `only` narrows the marketplaces by name; empty means all enabled ones.
    pub fn from_config(config: &AppConfig, only: &[String]) -> Result<Self> {
        let repo = Repository::open(&config.storage.db_path).context("Failed to open DuckDB")?;
        if config.storage.run_migrations {
            repo.run_migrations()?;
        }

        let profiles = load_profiles(&config.pipeline.selectors_path)?;
        let rules = load_category_rules(config.pipeline.category_rules_path.as_deref())?;
        let throttle = Arc::new(Throttle::from_config(&config.crawler));

        let mut adapters: Vec<Box<dyn MarketplaceAdapter>> = Vec::new();
        for market in config.active_marketplaces(only) {
            let Some(spec) = profiles.get(&market.name) else {
                error!("{}: no selector profile, marketplace skipped", market.name);
                continue;
            };
            let adapter = SelectorProfile::compile(spec).and_then(|profile| {
                SiteAdapter::new(market.clone(), profile, &config.crawler, Arc::clone(&throttle))
            });
            match adapter {
                Ok(a) => adapters.push(Box::new(a)),
                Err(e) => error!("{}: {}, marketplace skipped", market.name, e),
            }
        }
        if adapters.is_empty() {
            warn!("No runnable marketplace configured");
        }

        let browser = HttpBrowser::new(&config.crawler, throttle);
        Ok(Self::new(
            PipelineSettings::from_config(config),
            repo,
            Box::new(browser),
            adapters,
            rules,
        ))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub async fn run(&self, keywords: &[String]) -> Result<PipelineStats> {
        let mut stats = PipelineStats {
            keywords: keywords.len(),
            ..Default::default()
        };

        let run_id = self.repo.begin_crawl_run().unwrap_or_else(|e| {
            warn!("crawl run log unavailable: {:#}", e);
            0
        });

        let mut store_ids = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            let id = self
                .repo
                .get_or_create_reference(ReferenceTable::Stores, adapter.store_name())
                .with_context(|| format!("store row for {}", adapter.name()))?;
            store_ids.push(id);
        }

        let mut first_pass = true;
        for keyword in keywords {
            let category = self.rules.classify(keyword);
            let category_id = match self
                .repo
                .get_or_create_reference(ReferenceTable::Categories, category)
            {
                Ok(id) => id,
                Err(e) => {
                    error!(keyword = %keyword, "category {:?} unavailable: {:#}", category, e);
                    stats.errors += 1;
                    continue;
                }
            };
            info!("=== {:?} → {} ===", keyword, category);

            for (adapter, &store_id) in self.adapters.iter().zip(&store_ids) {
                if !first_pass && !self.settings.pass_delay.is_zero() {
                    sleep(self.settings.pass_delay).await;
                }
                first_pass = false;
                stats.passes += 1;

                let marketplace = adapter.name();
                // Stage logs further down (extraction, enrichment) only see these
                // fields through the span.
                let span = info_span!("pass", keyword = %keyword, marketplace);
                match self
                    .run_pass(keyword, adapter.as_ref(), category_id, store_id, &mut stats)
                    .instrument(span)
                    .await
                {
                    Ok(PassOutcome::Done { saved }) => {
                        debug!(keyword = %keyword, marketplace, stage = ?PassStage::Done);
                        info!(keyword = %keyword, marketplace, "{} products saved", saved);
                    }
                    Ok(PassOutcome::Empty) => {
                        stats.passes_empty += 1;
                        warn!(keyword = %keyword, marketplace, "no listings, skipping");
                    }
                    Err(e) => {
                        debug!(keyword = %keyword, marketplace, stage = ?PassStage::Failed);
                        stats.passes_failed += 1;
                        warn!(keyword = %keyword, marketplace, "pass abandoned: {}", e);
                    }
                }
            }
        }

        let failure = (stats.passes_failed > 0 || stats.errors > 0).then(|| {
            format!("{} passes failed, {} write errors", stats.passes_failed, stats.errors)
        });
        self.repo
            .finish_crawl_run(
                run_id,
                stats.passes,
                stats.products_saved,
                stats.prices_recorded,
                failure.as_deref(),
            )
            .ok();

        info!(
            "=== Done: {} keywords | {} passes ({} failed, {} empty) | {} saved | {} dropped | {} errors ===",
            stats.keywords,
            stats.passes,
            stats.passes_failed,
            stats.passes_empty,
            stats.products_saved,
            stats.candidates_dropped,
            stats.errors,
        );

        Ok(stats)
    }

    async fn run_pass(
        &self,
        keyword: &str,
        adapter: &dyn MarketplaceAdapter,
        category_id: i64,
        store_id: i64,
        stats: &mut PipelineStats,
    ) -> Result<PassOutcome, CrawlError> {
        let marketplace = adapter.name();
        let max_results = adapter.max_results().unwrap_or(self.settings.max_results);
        debug!(keyword, marketplace, stage = ?PassStage::Searching, max_results);

        let extraction = {
            // Dropped at the end of this block or on the first `?`.
            let session = self.browser.open_session()?;
            adapter.search(session.as_ref(), keyword, max_results).await?
        };

        debug!(
            keyword,
            marketplace,
            stage = ?PassStage::Extracting,
            "{} cards, {} dropped",
            extraction.candidates.len(),
            extraction.dropped
        );
        stats.candidates_dropped += extraction.dropped;
        if extraction.candidates.is_empty() {
            return Ok(PassOutcome::Empty);
        }

        let mut saved = 0;
        for candidate in &extraction.candidates {
            stats.candidates_seen += 1;
            match self
                .process_candidate(keyword, adapter, candidate, category_id, store_id)
                .instrument(info_span!("candidate", title = %candidate.title))
                .await
            {
                Ok(CandidateOutcome::Saved) => saved += 1,
                Ok(CandidateOutcome::Dropped) => stats.candidates_dropped += 1,
                Ok(CandidateOutcome::Skipped) => stats.unresolved_skipped += 1,
                Err(e) => {
                    stats.errors += 1;
                    warn!(
                        keyword,
                        marketplace,
                        title = %candidate.title,
                        "write failed: {:#}",
                        e
                    );
                }
            }
        }

        stats.products_saved += saved;
        stats.prices_recorded += saved;
        Ok(PassOutcome::Done { saved })
    }

    async fn process_candidate(
        &self,
        keyword: &str,
        adapter: &dyn MarketplaceAdapter,
        candidate: &ListingCandidate,
        category_id: i64,
        store_id: i64,
    ) -> Result<CandidateOutcome> {
        let marketplace = adapter.name();

        let price = match parse_price(&candidate.raw_price) {
            Ok(p) => p,
            Err(e) => {
                warn!(keyword, marketplace, title = %candidate.title, "dropped: {}", e);
                return Ok(CandidateOutcome::Dropped);
            }
        };

        debug!(keyword, marketplace, stage = ?PassStage::Resolving, link = %candidate.link);
        let key_features = match adapter.resolve_id(&candidate.link) {
            Some(id) => {
                debug!(keyword, marketplace, stage = ?PassStage::Enriching, id = %id);
                adapter.enrich(&id).await
            }
            None if self.settings.unresolved == UnresolvedPolicy::Skip => {
                info!(keyword, marketplace, title = %candidate.title, "no product id, skipped");
                return Ok(CandidateOutcome::Skipped);
            }
            None => {
                debug!(keyword, marketplace, title = %candidate.title, "no product id, saving without enrichment");
                KeyFeatures::new()
            }
        };

        debug!(keyword, marketplace, stage = ?PassStage::Persisting, title = %candidate.title);
        let purchase_url = adapter.purchase_url(&candidate.link);
        let product_id = self.repo.upsert_product(&NewProduct {
            name: &candidate.title,
            store_id,
            category_id,
            purchase_url: &purchase_url,
            description: "",
            key_features: &key_features,
        })?;
        self.repo.upsert_image(product_id, &candidate.image_url)?;
        self.repo.append_price_point(product_id, store_id, price)?;

        info!("  ⤷ #{} {} @ {}", product_id, candidate.title, price);
        Ok(CandidateOutcome::Saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductId;
    use crate::scraper::http_client::{BrowserSession, DomSnapshot};
    use crate::scraper::identity::IdentityResolver;
    use crate::config::{CrawlerConfig, MarketplaceConfig};
    use crate::scraper::parsers::{Extraction, ProfileSpec};
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // ── Stubs ─────────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct SessionLedger {
        opened: AtomicUsize,
        released: AtomicUsize,
    }

    struct StubBrowser(Arc<SessionLedger>);

    struct StubSession(Arc<SessionLedger>);

    impl Browser for StubBrowser {
        fn open_session(&self) -> Result<Box<dyn BrowserSession>, CrawlError> {
            self.0.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubSession(Arc::clone(&self.0))))
        }
    }

    #[async_trait]
    impl BrowserSession for StubSession {
        async fn render(&self, url: &str) -> Result<DomSnapshot, CrawlError> {
            Ok(DomSnapshot::new(url, "<html></html>"))
        }
    }

    impl Drop for StubSession {
        fn drop(&mut self) {
            self.0.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Yields the same cards for every keyword, titles prefixed with the
    /// keyword and links moved to the adapter's own host. Keywords in
    /// `time_out_on` fail with a page-load timeout instead.
    struct StubAdapter {
        name: &'static str,
        time_out_on: Vec<&'static str>,
        cards: Vec<(&'static str, &'static str, &'static str)>,
        identity: IdentityResolver,
        enrich_calls: AtomicUsize,
    }

    impl StubAdapter {
        fn new(name: &'static str, cards: Vec<(&'static str, &'static str, &'static str)>) -> Self {
            Self {
                name,
                time_out_on: Vec::new(),
                cards,
                identity: IdentityResolver::new(vec![], "target", r"/products/(\d+)").unwrap(),
                enrich_calls: AtomicUsize::new(0),
            }
        }

        fn timing_out_on(mut self, keyword: &'static str) -> Self {
            self.time_out_on.push(keyword);
            self
        }
    }

    #[async_trait]
    impl MarketplaceAdapter for StubAdapter {
        fn name(&self) -> &str {
            self.name
        }

        fn store_name(&self) -> &str {
            self.name
        }

        async fn search(
            &self,
            session: &dyn BrowserSession,
            keyword: &str,
            max_results: usize,
        ) -> Result<Extraction, CrawlError> {
            let url = format!("https://{}.example/search?q={}", self.name, keyword);
            session.render(&url).await?;
            if self.time_out_on.iter().any(|k| *k == keyword) {
                return Err(CrawlError::PageLoad {
                    url,
                    locator: "li.card".into(),
                    waited: Duration::from_secs(10),
                });
            }
            let candidates = self
                .cards
                .iter()
                .take(max_results)
                .map(|(title, price, link)| {
                    let link = link.replace("shop.example", &format!("{}.example", self.name));
                    ListingCandidate {
                        title: format!("{} {}", keyword, title),
                        raw_price: price.to_string(),
                        image_url: format!("{}.jpg", link),
                        link,
                    }
                })
                .collect();
            Ok(Extraction { candidates, dropped: 0 })
        }

        fn resolve_id(&self, link: &str) -> Option<ProductId> {
            self.identity.resolve_id(link)
        }

        async fn enrich(&self, id: &ProductId) -> KeyFeatures {
            self.enrich_calls.fetch_add(1, Ordering::SeqCst);
            KeyFeatures::from([("source_id".to_string(), id.to_string())])
        }
    }

    fn settings(unresolved: UnresolvedPolicy) -> PipelineSettings {
        PipelineSettings {
            max_results: 5,
            pass_delay: Duration::ZERO,
            unresolved,
        }
    }

    fn pipeline(
        adapters: Vec<Box<dyn MarketplaceAdapter>>,
        unresolved: UnresolvedPolicy,
    ) -> (Pipeline, Arc<SessionLedger>) {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();
        let ledger = Arc::new(SessionLedger::default());
        let p = Pipeline::new(
            settings(unresolved),
            repo,
            Box::new(StubBrowser(Arc::clone(&ledger))),
            adapters,
            CategoryRules::builtin(),
        );
        (p, ledger)
    }

    fn keywords(ks: &[&str]) -> Vec<String> {
        ks.iter().map(|k| k.to_string()).collect()
    }

    const TWO_CARDS: [(&str, &str, &str); 2] = [
        ("충전기", "19,900원", "https://shop.example/products/1"),
        ("케이블", "5,000원", "https://shop.example/products/2"),
    ];

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_timeout_is_isolated_to_its_pass() {
        let a = StubAdapter::new("a", TWO_CARDS.to_vec()).timing_out_on("X");
        let b = StubAdapter::new("b", TWO_CARDS.to_vec());
        let (p, ledger) = pipeline(vec![Box::new(a), Box::new(b)], UnresolvedPolicy::Persist);

        let stats = p.run(&keywords(&["X", "Y"])).await.unwrap();

        assert_eq!(stats.passes, 4);
        assert_eq!(stats.passes_failed, 1);
        // (X,b), (Y,a), (Y,b) each save both cards
        assert_eq!(stats.products_saved, 6);
        assert_eq!(p.repository().table_counts().unwrap().prices, 6);

        // every session released, including the failed one
        assert_eq!(ledger.opened.load(Ordering::SeqCst), 4);
        assert_eq!(ledger.released.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_unresolved_links_persist_without_enrichment() {
        let adapter = StubAdapter::new(
            "a",
            vec![
                ("충전기", "19,900원", "https://shop.example/products/1"),
                ("기획전", "9,900원", "https://shop.example/events/summer"),
                ("문의", "가격문의", "https://shop.example/products/3"),
            ],
        );
        let adapter = Arc::new(adapter);
        let (p, _) = pipeline(vec![Box::new(ArcAdapter(Arc::clone(&adapter)))], UnresolvedPolicy::Persist);

        let stats = p.run(&keywords(&["무선 충전기"])).await.unwrap();

        assert_eq!(stats.candidates_seen, 3);
        assert_eq!(stats.candidates_dropped, 1);
        assert_eq!(stats.products_saved, 2);
        assert_eq!(adapter.enrich_calls.load(Ordering::SeqCst), 1);

        let enriched = p.repository().find_product(1).unwrap().unwrap();
        assert_eq!(enriched.key_features["source_id"], "1");
        let plain = p.repository().find_product(2).unwrap().unwrap();
        assert!(plain.key_features.is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_links_can_be_skipped() {
        let adapter = StubAdapter::new(
            "a",
            vec![
                ("충전기", "19,900원", "https://shop.example/products/1"),
                ("기획전", "9,900원", "https://shop.example/events/summer"),
            ],
        );
        let (p, _) = pipeline(vec![Box::new(adapter)], UnresolvedPolicy::Skip);

        let stats = p.run(&keywords(&["충전기"])).await.unwrap();

        assert_eq!(stats.products_saved, 1);
        assert_eq!(stats.unresolved_skipped, 1);
        assert_eq!(p.repository().table_counts().unwrap().products, 1);
    }

    #[tokio::test]
    async fn test_rerun_appends_prices_only() {
        let adapter = StubAdapter::new("a", TWO_CARDS.to_vec());
        let (p, _) = pipeline(vec![Box::new(adapter)], UnresolvedPolicy::Persist);
        let kws = keywords(&["무선 충전기"]);

        p.run(&kws).await.unwrap();
        p.run(&kws).await.unwrap();

        let counts = p.repository().table_counts().unwrap();
        assert_eq!(counts.stores, 1);
        assert_eq!(counts.categories, 1);
        assert_eq!(counts.products, 2);
        assert_eq!(counts.images, 2);
        assert_eq!(counts.prices, 4);
    }

    #[tokio::test]
    async fn test_category_shared_across_marketplaces() {
        let a = StubAdapter::new("a", TWO_CARDS.to_vec());
        let b = StubAdapter::new("b", TWO_CARDS.to_vec());
        let (p, _) = pipeline(vec![Box::new(a), Box::new(b)], UnresolvedPolicy::Persist);

        p.run(&keywords(&["기계식 키보드", "게이밍 마우스"])).await.unwrap();

        // both keywords map to 입력기기
        let counts = p.repository().table_counts().unwrap();
        assert_eq!(counts.categories, 1);
        assert_eq!(counts.stores, 2);
        let product = p.repository().find_product(1).unwrap().unwrap();
        let other = p.repository().find_product(3).unwrap().unwrap();
        assert_eq!(product.category_id, other.category_id);
        assert_ne!(product.store_id, other.store_id);
    }

    #[tokio::test]
    async fn test_empty_listing_counts_as_empty_pass() {
        let adapter = StubAdapter::new("a", vec![]);
        let (p, ledger) = pipeline(vec![Box::new(adapter)], UnresolvedPolicy::Persist);

        let stats = p.run(&keywords(&["없는 상품"])).await.unwrap();

        assert_eq!(stats.passes_empty, 1);
        assert_eq!(stats.passes_failed, 0);
        assert_eq!(ledger.released.load(Ordering::SeqCst), 1);
    }

    /// Serves the same search page to every session.
    struct PageBrowser(&'static str);

    struct PageSession(&'static str);

    impl Browser for PageBrowser {
        fn open_session(&self) -> Result<Box<dyn BrowserSession>, CrawlError> {
            Ok(Box::new(PageSession(self.0)))
        }
    }

    #[async_trait]
    impl BrowserSession for PageSession {
        async fn render(&self, url: &str) -> Result<DomSnapshot, CrawlError> {
            Ok(DomSnapshot::new(url, self.0))
        }
    }

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogCapture {
        fn line_with(&self, needle: &str) -> String {
            let text = String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned();
            text.lines()
                .find(|l| l.contains(needle))
                .unwrap_or_else(|| panic!("no log line with {:?} in:\n{}", needle, text))
                .to_string()
        }
    }

    #[tokio::test]
    async fn test_stage_warnings_carry_pass_and_card_context() {
        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        // second card has no price; first card's enrichment endpoint is closed
        const PAGE: &str = r#"
            <div class="item"><a href="/products/7"><span class="name">고속 충전기</span></a>
              <span class="price">19,900원</span><img src="/7.png"></div>
            <div class="item"><a href="/products/8"><span class="name">무선 충전기</span></a>
              <img src="/8.png"></div>"#;

        let market = MarketplaceConfig {
            name: "acme-mart".into(),
            store_name: "Acme".into(),
            search_url: "https://shop.example/search?q={keyword}".into(),
            api_base: Some("http://127.0.0.1:9".into()),
            ..Default::default()
        };
        let profile = SelectorProfile::compile(&ProfileSpec {
            item: "div.item".into(),
            title: ".name".into(),
            price: ".price".into(),
            link: "a".into(),
            image: "img".into(),
        })
        .unwrap();
        let crawler = CrawlerConfig {
            render_deadline_secs: 1,
            poll_interval_ms: 10,
            enrich_timeout_secs: 1,
            ..Default::default()
        };
        let throttle = Arc::new(Throttle::new(Duration::ZERO, Duration::ZERO));
        let adapter = SiteAdapter::new(market, profile, &crawler, throttle).unwrap();

        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();
        let p = Pipeline::new(
            settings(UnresolvedPolicy::Persist),
            repo,
            Box::new(PageBrowser(PAGE)),
            vec![Box::new(adapter)],
            CategoryRules::builtin(),
        );

        let stats = p.run(&keywords(&["charger"])).await.unwrap();
        assert_eq!(stats.products_saved, 1);
        assert_eq!(stats.candidates_dropped, 1);

        let dropped = capture.line_with("dropping listing card");
        assert!(dropped.contains("charger"), "{}", dropped);
        assert!(dropped.contains("acme-mart"), "{}", dropped);

        let enrichment = capture.line_with("enrichment skipped");
        assert!(enrichment.contains("charger"), "{}", enrichment);
        assert!(enrichment.contains("acme-mart"), "{}", enrichment);
        assert!(enrichment.contains("고속 충전기"), "{}", enrichment);
    }

    /// Lets a test keep a handle on an adapter it hands to the pipeline.
    struct ArcAdapter(Arc<StubAdapter>);

    #[async_trait]
    impl MarketplaceAdapter for ArcAdapter {
        fn name(&self) -> &str {
            self.0.name()
        }

        fn store_name(&self) -> &str {
            self.0.store_name()
        }

        async fn search(
            &self,
            session: &dyn BrowserSession,
            keyword: &str,
            max_results: usize,
        ) -> Result<Extraction, CrawlError> {
            self.0.search(session, keyword, max_results).await
        }

        fn resolve_id(&self, link: &str) -> Option<ProductId> {
            self.0.resolve_id(link)
        }

        async fn enrich(&self, id: &ProductId) -> KeyFeatures {
            self.0.enrich(id).await
        }
    }
}
