use crate::error::CrawlError;
use crate::models::{KeyFeatures, ProductId};
use crate::scraper::http_client::Throttle;
use crate::utils::collapse_whitespace;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// ── Response shape ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ProductInformation {
    #[serde(default)]
    data: Option<InformationData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InformationData {
    #[serde(default)]
    product_information_groups: Vec<InformationGroup>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InformationGroup {
    #[serde(default)]
    product_information_items: Vec<InformationItem>,
}

#[derive(Debug, Default, Deserialize)]
struct InformationItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

// ── Enricher ──────────────────────────────────────────────────────────────────

/// Fetches the structured "product information" table for a resolved id.
pub struct Enricher {
    client: reqwest::Client,
    api_base: String,
    throttle: Arc<Throttle>,
}

impl Enricher {
    pub fn new(
        api_base: &str,
        user_agent: &str,
        timeout: Duration,
        throttle: Arc<Throttle>,
    ) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            throttle,
        })
    }

    fn endpoint(&self, id: &ProductId) -> String {
        format!("{}/products/{}/product-information", self.api_base, id.as_str())
    }

    /// Attribute map for `id`; empty on any failure. Never retried.
    pub async fn enrich(&self, id: &ProductId) -> KeyFeatures {
        match self.fetch(id).await {
            Ok(features) => {
                debug!(product_id = %id, attributes = features.len(), "enriched");
                features
            }
            Err(e) => {
                warn!(product_id = %id, "enrichment skipped: {}", e);
                KeyFeatures::new()
            }
        }
    }

    async fn fetch(&self, id: &ProductId) -> Result<KeyFeatures, CrawlError> {
        let url = self.endpoint(id);
        self.throttle.wait_for_url(&url).await;

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CrawlError::EnrichmentFetch(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CrawlError::EnrichmentFetch(format!("HTTP {} from {}", status, url)));
        }

        let body: ProductInformation = resp
            .json()
            .await
            .map_err(|e| CrawlError::EnrichmentFetch(format!("bad body from {}: {}", url, e)))?;

        Ok(flatten_attributes(body))
    }
}

/// "Battery  Type " → "battery_type"
pub fn normalise_attribute_key(title: &str) -> String {
    collapse_whitespace(title, "_").to_lowercase()
}

/// Groups → flat map. Blank keys or values are dropped, later keys win.
pub fn flatten_attributes(info: ProductInformation) -> KeyFeatures {
    let mut out = KeyFeatures::new();
    let groups = info
        .data
        .map(|d| d.product_information_groups)
        .unwrap_or_default();

    for item in groups.into_iter().flat_map(|g| g.product_information_items) {
        let key = item.title.as_deref().map(normalise_attribute_key).unwrap_or_default();
        let value = item.content.as_deref().map(str::trim).unwrap_or_default();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        out.insert(key, value.to_string());
    }
    out
}
