use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Flat attribute set gathered by enrichment, stored as JSON text.
pub type KeyFeatures = BTreeMap<String, String>;

// ── Identity ──────────────────────────────────────────────────────────────────

/// Marketplace-side canonical product id ("12345", "B123456789", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Raw listing ───────────────────────────────────────────────────────────────

/// One search-result card as read off the page, before any normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingCandidate {
    pub title: String,
    pub raw_price: String,
    pub link: String,
    pub image_url: String,
}

// ── Persisted rows ────────────────────────────────────────────────────────────

/// Input to `Repository::upsert_product`.
#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub name: &'a str,
    pub store_id: i64,
    pub category_id: i64,
    pub purchase_url: &'a str,
    pub description: &'a str,
    pub key_features: &'a KeyFeatures,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    pub id: i64,
    pub name: String,
    pub store_id: i64,
    pub category_id: i64,
    pub purchase_url: String,
    pub description: String,
    pub key_features: KeyFeatures,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductImage {
    pub id: i64,
    pub product_id: i64,
    pub url: String,
    pub is_main: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    pub id: i64,
    pub product_id: i64,
    pub store_id: i64,
    pub price: f64,
    pub crawled_at: NaiveDateTime,
}
