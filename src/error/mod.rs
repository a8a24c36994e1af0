use std::time::Duration;
use thiserror::Error;

/// Recoverable failures raised by the crawl stages.
///
/// Only the application layer (opening the store, reading the keyword list)
/// escalates to a fatal `anyhow::Error`; everything here is handled per pass
/// or per candidate.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("selector for `{field}` matched nothing")]
    SelectorMiss { field: &'static str },

    #[error("page load timed out after {waited:.2?} waiting for `{locator}` at {url}")]
    PageLoad {
        url: String,
        locator: String,
        waited: Duration,
    },

    #[error("no digits in price text {0:?}")]
    PriceParse(String),

    #[error("enrichment fetch failed: {0}")]
    EnrichmentFetch(String),

    #[error("invalid selector `{selector}` for `{field}`")]
    InvalidSelector { field: &'static str, selector: String },

    #[error("invalid id pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
}
