//! Startup inputs: keyword list, selector profile document, category rules.

use crate::scraper::cleaner::{CategoryRule, CategoryRules};
use crate::scraper::parsers::ProfileSpec;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// One keyword per line; lines are trimmed and blank ones skipped.
pub fn parse_keywords(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn load_keywords(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read keyword list {:?}", path))?;
    let keywords = parse_keywords(&text);
    info!("{} keywords loaded from {:?}", keywords.len(), path);
    Ok(keywords)
}

/// `{ "<marketplace>": {item, title, price, link, image}, ... }`
pub fn parse_profiles(json: &str) -> Result<BTreeMap<String, ProfileSpec>> {
    serde_json::from_str(json).context("Malformed selector profile document")
}

pub fn load_profiles(path: &Path) -> Result<BTreeMap<String, ProfileSpec>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read selector profiles {:?}", path))?;
    let profiles = parse_profiles(&json)?;
    debug!("selector profiles for: {:?}", profiles.keys().collect::<Vec<_>>());
    Ok(profiles)
}

/// `[{"pattern": "...", "category": "..."}, ...]`, order preserved.
pub fn parse_category_rules(json: &str) -> Result<CategoryRules> {
    let rules: Vec<CategoryRule> =
        serde_json::from_str(json).context("Malformed category rule document")?;
    Ok(CategoryRules::new(rules))
}

/// Rules from `path`, or the built-in set when no path is configured.
pub fn load_category_rules(path: Option<&Path>) -> Result<CategoryRules> {
    let Some(path) = path else {
        return Ok(CategoryRules::builtin());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read category rules {:?}", path))?;
    let rules = parse_category_rules(&json)?;
    info!("{} category rules loaded from {:?}", rules.len(), path);
    Ok(rules)
}
