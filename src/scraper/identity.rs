//! Canonical product ids from listing links.
//!
//! Sponsored results link through an ad-click host that carries the real
//! product URL percent-encoded in a query parameter:
//!
//! ```text
//! https://adoffice.11st.co.kr/click?target=https%3A%2F%2Fwww.11st.co.kr%2Fproducts%2F12345
//!   → https://www.11st.co.kr/products/12345 → "12345"
//! ```

use crate::config::MarketplaceConfig;
use crate::error::CrawlError;
use crate::models::ProductId;
use regex::Regex;
use url::Url;

#[derive(Debug, Clone)]
pub struct IdentityResolver {
    redirect_hosts: Vec<String>,
    redirect_param: String,
    id_pattern: Regex,
}

impl IdentityResolver {
    /// `id_pattern` must have one capture group holding the id.
    pub fn new(
        redirect_hosts: Vec<String>,
        redirect_param: impl Into<String>,
        id_pattern: &str,
    ) -> Result<Self, CrawlError> {
        Ok(Self {
            redirect_hosts: redirect_hosts
                .into_iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .collect(),
            redirect_param: redirect_param.into(),
            id_pattern: Regex::new(id_pattern)?,
        })
    }

    pub fn from_config(cfg: &MarketplaceConfig) -> Result<Self, CrawlError> {
        Self::new(
            cfg.redirect_hosts.clone(),
            cfg.redirect_param.clone(),
            &cfg.id_pattern,
        )
    }

    /// The URL the link actually points at: the decoded redirect target for
    /// ad-click links, the link itself otherwise. `None` for unparseable links
    /// and redirects that lack the target parameter.
    pub fn resolution_target(&self, link: &str) -> Option<String> {
        let url = Url::parse(link.trim()).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();

        if !self.is_redirect_host(&host) {
            return Some(url.to_string());
        }

        // query_pairs() percent-decodes.
        url.query_pairs()
            .find(|(k, _)| k == self.redirect_param.as_str())
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn resolve_id(&self, link: &str) -> Option<ProductId> {
        let target = self.resolution_target(link)?;
        let caps = self.id_pattern.captures(&target)?;
        let id = caps.get(1)?.as_str();
        if id.is_empty() {
            return None;
        }
        Some(ProductId::new(id))
    }

    fn is_redirect_host(&self, host: &str) -> bool {
        self.redirect_hosts.iter().any(|h| {
            host == h
                || host
                    .strip_suffix(h.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(
            vec!["ad.shop.example".to_string()],
            "target",
            r"/products/(?:pa/)?(\d+)",
        )
        .unwrap()
    }

    #[test]
    fn test_unwraps_ad_redirect() {
        let link = "https://ad.shop.example/click?slot=3&target=https%3A%2F%2Fshop.example%2Fproducts%2F12345";
        assert_eq!(resolver().resolve_id(link), Some(ProductId::new("12345")));
        assert_eq!(
            resolver().resolution_target(link).as_deref(),
            Some("https://shop.example/products/12345")
        );
    }

    #[test]
    fn test_redirect_subdomain_matches() {
        let link = "https://kr.ad.shop.example/c?target=https%3A%2F%2Fshop.example%2Fproducts%2F777";
        assert_eq!(resolver().resolve_id(link), Some(ProductId::new("777")));
    }

    #[test]
    fn test_direct_link_and_subpath_marker() {
        let r = resolver();
        assert_eq!(
            r.resolve_id("https://shop.example/products/4821?trTypeCd=22"),
            Some(ProductId::new("4821"))
        );
        assert_eq!(
            r.resolve_id("https://shop.example/products/pa/99001"),
            Some(ProductId::new("99001"))
        );
    }

    #[test]
    fn test_unrecognised_links_yield_none() {
        let r = resolver();
        assert_eq!(r.resolve_id("https://shop.example/events/summer"), None);
        assert_eq!(r.resolve_id("not a url"), None);
        assert_eq!(r.resolve_id(""), None);
        // redirect host without its target parameter
        assert_eq!(r.resolve_id("https://ad.shop.example/click?slot=3"), None);
        // look-alike host is not a redirect
        assert_eq!(
            r.resolve_id("https://notad.shop.example/click?target=https%3A%2F%2Fshop.example%2Fproducts%2F1"),
            None
        );
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(IdentityResolver::new(vec![], "target", "(unclosed").is_err());
    }
}
