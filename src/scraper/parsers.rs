use crate::error::CrawlError;
use crate::models::ListingCandidate;
use crate::scraper::http_client::{BrowserSession, DomSnapshot};
use crate::utils::collapse_whitespace;
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};
use url::Url;

// ── Selector profile ──────────────────────────────────────────────────────────

/// Locator strings for one marketplace, as written in the profile document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSpec {
    pub item: String,
    pub title: String,
    pub price: String,
    pub link: String,
    pub image: String,
}

/// Compiled locators. `item` matches result cards; the others are evaluated
/// inside each card.
#[derive(Debug, Clone)]
pub struct SelectorProfile {
    item_locator: String,
    item: Selector,
    title: Selector,
    price: Selector,
    link: Selector,
    image: Selector,
}

impl SelectorProfile {
    pub fn compile(spec: &ProfileSpec) -> Result<Self, CrawlError> {
        Ok(Self {
            item_locator: spec.item.clone(),
            item: compile_one("item", &spec.item)?,
            title: compile_one("title", &spec.title)?,
            price: compile_one("price", &spec.price)?,
            link: compile_one("link", &spec.link)?,
            image: compile_one("image", &spec.image)?,
        })
    }
}

fn compile_one(field: &'static str, css: &str) -> Result<Selector, CrawlError> {
    Selector::parse(css).map_err(|_| CrawlError::InvalidSelector {
        field,
        selector: css.to_string(),
    })
}

// ── Waiting for the listing ───────────────────────────────────────────────────

/// How long to wait for item containers and how often to look again.
#[derive(Debug, Clone, Copy)]
pub struct RenderWait {
    pub deadline: Duration,
    pub poll_interval: Duration,
}

/// Render `url` until the profile's item container shows up.
/// Fails with `PageLoad` once `wait.deadline` has passed.
pub async fn wait_for_listing(
    session: &dyn BrowserSession,
    url: &str,
    profile: &SelectorProfile,
    wait: RenderWait,
) -> Result<DomSnapshot, CrawlError> {
    let started = Instant::now();
    match timeout(wait.deadline, poll_until_present(session, url, profile, wait.poll_interval)).await {
        Ok(result) => result,
        Err(_) => Err(CrawlError::PageLoad {
            url: url.to_string(),
            locator: profile.item_locator.clone(),
            waited: started.elapsed(),
        }),
    }
}

async fn poll_until_present(
    session: &dyn BrowserSession,
    url: &str,
    profile: &SelectorProfile,
    poll_interval: Duration,
) -> Result<DomSnapshot, CrawlError> {
    loop {
        let snapshot = session.render(url).await?;
        if snapshot.contains(&profile.item) {
            return Ok(snapshot);
        }
        debug!("`{}` not present yet at {}", profile.item_locator, url);
        sleep(poll_interval).await;
    }
}

// ── Extraction ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Extraction {
    pub candidates: Vec<ListingCandidate>,
    pub dropped: usize,
}

/// Read up to `max_results` cards. A card with an unreadable field is dropped
/// on its own; the rest of the page is still read.
pub fn extract_candidates(
    snapshot: &DomSnapshot,
    profile: &SelectorProfile,
    max_results: usize,
) -> Extraction {
    let doc = snapshot.document();
    let base = Url::parse(snapshot.url()).ok();
    let mut out = Extraction::default();

    for (idx, card) in doc.select(&profile.item).take(max_results).enumerate() {
        match read_candidate(card, profile, base.as_ref()) {
            Ok(candidate) => out.candidates.push(candidate),
            Err(e) => {
                warn!(card = idx, "dropping listing card: {}", e);
                out.dropped += 1;
            }
        }
    }

    out
}

fn read_candidate(
    card: ElementRef<'_>,
    profile: &SelectorProfile,
    base: Option<&Url>,
) -> Result<ListingCandidate, CrawlError> {
    let title = text_of(card, &profile.title, "title")?;
    let raw_price = text_of(card, &profile.price, "price")?;

    let href = attr_of(card, &profile.link, &["href"], "link")?;
    let link = absolutize(base, &href);

    let src = attr_of(card, &profile.image, &["src", "data-src", "data-original"], "image")?;
    let image_url = absolutize(base, &src);

    Ok(ListingCandidate {
        title,
        raw_price,
        link,
        image_url,
    })
}

fn text_of(card: ElementRef<'_>, sel: &Selector, field: &'static str) -> Result<String, CrawlError> {
    card.select(sel)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>(), " "))
        .filter(|t| !t.is_empty())
        .ok_or(CrawlError::SelectorMiss { field })
}

/// First non-blank attribute among `attrs`, so lazily loaded images that keep
/// a placeholder-free `data-src` still resolve.
fn attr_of(
    card: ElementRef<'_>,
    sel: &Selector,
    attrs: &[&str],
    field: &'static str,
) -> Result<String, CrawlError> {
    let el = card.select(sel).next().ok_or(CrawlError::SelectorMiss { field })?;
    attrs
        .iter()
        .filter_map(|a| el.value().attr(a))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(CrawlError::SelectorMiss { field })
}

/// Protocol-relative and relative links are common on listing pages.
fn absolutize(base: Option<&Url>, href: &str) -> String {
    match base.and_then(|b| b.join(href).ok()) {
        Some(u) => u.to_string(),
        None => href.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PAGE: &str = r#"
    <html><body>
      <ul class="results">
        <li class="card">
          <a class="title" href="/products/1001"><span>무선   충전기</span> 15W</a>
          <div class="price"><strong>19,900</strong>원</div>
          <img class="thumb" src="//cdn.shop.example/1001.jpg">
        </li>
        <li class="card">
          <a class="title" href="https://shop.example/products/1002">고속 충전기</a>
          <img class="thumb" src="https://cdn.shop.example/1002.jpg">
        </li>
        <li class="card">
          <a class="title" href="/products/1003">차량용 충전기</a>
          <div class="price">가격문의</div>
          <img class="thumb" src="" data-src="https://cdn.shop.example/1003.jpg">
        </li>
        <li class="card">
          <a class="title" href="/products/1004">멀티 충전기</a>
          <div class="price">32,000원</div>
          <img class="thumb" src="https://cdn.shop.example/1004.jpg">
        </li>
      </ul>
    </body></html>"#;

    fn spec() -> ProfileSpec {
        ProfileSpec {
            item: "li.card".into(),
            title: "a.title".into(),
            price: "div.price".into(),
            link: "a.title".into(),
            image: "img.thumb".into(),
        }
    }

    fn profile() -> SelectorProfile {
        SelectorProfile::compile(&spec()).unwrap()
    }

    #[test]
    fn test_extract_drops_only_broken_cards() {
        let snap = DomSnapshot::new("https://shop.example/search?q=x", PAGE);
        let out = extract_candidates(&snap, &profile(), 10);

        assert_eq!(out.candidates.len(), 3);
        assert_eq!(out.dropped, 1);

        let first = &out.candidates[0];
        assert_eq!(first.title, "무선 충전기 15W");
        assert_eq!(first.raw_price, "19,900원");
        assert_eq!(first.link, "https://shop.example/products/1001");
        assert_eq!(first.image_url, "https://cdn.shop.example/1001.jpg");

        // price text is kept raw; normalization happens later
        assert_eq!(out.candidates[1].raw_price, "가격문의");
        assert_eq!(out.candidates[1].image_url, "https://cdn.shop.example/1003.jpg");
    }

    #[test]
    fn test_split_markup_reads_as_rendered() {
        let html = r#"<li class="card">
            <a class="title" href="/products/24"><b>갤럭시</b>S24 <em>자급제</em></a>
            <div class="price"><strong>1,155,000</strong>원</div>
            <img class="thumb" src="/24.jpg">
        </li>"#;
        let snap = DomSnapshot::new("https://shop.example/search", html);
        let out = extract_candidates(&snap, &profile(), 5);
        assert_eq!(out.candidates[0].title, "갤럭시S24 자급제");
        assert_eq!(out.candidates[0].raw_price, "1,155,000원");
    }

    #[test]
    fn test_extract_respects_max_results() {
        let snap = DomSnapshot::new("https://shop.example/search", PAGE);
        let out = extract_candidates(&snap, &profile(), 2);
        // two cards inspected, the second has no price
        assert_eq!(out.candidates.len(), 1);
        assert_eq!(out.dropped, 1);
    }

    #[test]
    fn test_empty_page_yields_nothing() {
        let snap = DomSnapshot::new("https://shop.example/search", "<html></html>");
        let out = extract_candidates(&snap, &profile(), 5);
        assert!(out.candidates.is_empty());
        assert_eq!(out.dropped, 0);
    }

    #[test]
    fn test_invalid_selector_is_reported() {
        let mut bad = spec();
        bad.price = "div[[".into();
        match SelectorProfile::compile(&bad) {
            Err(CrawlError::InvalidSelector { field, .. }) => assert_eq!(field, "price"),
            other => panic!("expected InvalidSelector, got {:?}", other),
        }
    }

    /// Serves `empty_renders` pages without cards, then the real page.
    struct SlowSession {
        empty_renders: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BrowserSession for SlowSession {
        async fn render(&self, url: &str) -> Result<DomSnapshot, CrawlError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let html = if n < self.empty_renders { "<html><body>loading</body></html>" } else { PAGE };
            Ok(DomSnapshot::new(url, html))
        }
    }

    #[tokio::test]
    async fn test_wait_polls_until_cards_appear() {
        let session = SlowSession { empty_renders: 2, calls: AtomicUsize::new(0) };
        let wait = RenderWait {
            deadline: Duration::from_secs(2),
            poll_interval: Duration::from_millis(5),
        };
        let snap = wait_for_listing(&session, "https://shop.example/s", &profile(), wait)
            .await
            .unwrap();
        assert!(snap.contains(&profile().item));
        assert_eq!(session.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_times_out_with_page_load_error() {
        let session = SlowSession { empty_renders: usize::MAX, calls: AtomicUsize::new(0) };
        let wait = RenderWait {
            deadline: Duration::from_millis(60),
            poll_interval: Duration::from_millis(10),
        };
        let err = wait_for_listing(&session, "https://shop.example/s", &profile(), wait)
            .await
            .unwrap_err();
        match err {
            CrawlError::PageLoad { locator, .. } => assert_eq!(locator, "li.card"),
            other => panic!("expected PageLoad, got {:?}", other),
        }
    }
}
