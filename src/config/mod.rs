use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default = "default_marketplaces")]
    pub marketplaces: Vec<MarketplaceConfig>,
}

/// HTTP, rendering and pacing knobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlerConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How long a search page may take to show its item containers.
    #[serde(default = "default_render_deadline_secs")]
    pub render_deadline_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Minimum spacing between two requests to the same domain.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Fixed pause between keyword/marketplace passes.
    #[serde(default = "default_pass_delay_ms")]
    pub pass_delay_ms: u64,

    #[serde(default = "default_enrich_timeout_secs")]
    pub enrich_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_keywords_path")]
    pub keywords_path: PathBuf,

    #[serde(default = "default_selectors_path")]
    pub selectors_path: PathBuf,

    /// Ordered `[{pattern, category}]` JSON; built-in rules when unset.
    #[serde(default)]
    pub category_rules_path: Option<PathBuf>,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default)]
    pub unresolved: UnresolvedPolicy,
}

/// What to do with a listing whose link yields no canonical product id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// Store it anyway, without enrichment.
    #[default]
    Persist,
    Skip,
}

/// One storefront to crawl.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketplaceConfig {
    /// Key into the selector profile document ("11st", "gmarket", ...).
    pub name: String,

    /// Row name in `stores`.
    pub store_name: String,

    /// Search page URL; `{keyword}` is replaced by the encoded keyword.
    pub search_url: String,

    /// Base of the product-information API. No enrichment when unset.
    #[serde(default)]
    pub api_base: Option<String>,

    #[serde(default)]
    pub redirect_hosts: Vec<String>,

    #[serde(default = "default_redirect_param")]
    pub redirect_param: String,

    #[serde(default = "default_id_pattern")]
    pub id_pattern: String,

    #[serde(default)]
    pub max_results: Option<usize>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_timeout_secs() -> u64 {
    30
}
fn default_render_deadline_secs() -> u64 {
    10
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_request_delay_ms() -> u64 {
    800
}
fn default_jitter_ms() -> u64 {
    400
}
fn default_pass_delay_ms() -> u64 {
    1000
}
fn default_enrich_timeout_secs() -> u64 {
    5
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36"
        .to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/market.duckdb")
}
fn default_keywords_path() -> PathBuf {
    PathBuf::from("keywords.txt")
}
fn default_selectors_path() -> PathBuf {
    PathBuf::from("selectors.json")
}
fn default_max_results() -> usize {
    5
}
fn default_redirect_param() -> String {
    "target".to_string()
}
fn default_id_pattern() -> String {
    r"/products/(?:pa/)?(\d+)".to_string()
}
fn default_true() -> bool {
    true
}

fn default_marketplaces() -> Vec<MarketplaceConfig> {
    vec![
        MarketplaceConfig {
            name: "11st".to_string(),
            store_name: "11번가".to_string(),
            search_url: "https://search.11st.co.kr/Search.tmall?kwd={keyword}".to_string(),
            api_base: Some("https://apis.11st.co.kr".to_string()),
            redirect_hosts: vec!["adoffice.11st.co.kr".to_string()],
            redirect_param: default_redirect_param(),
            id_pattern: default_id_pattern(),
            max_results: None,
            enabled: true,
        },
        MarketplaceConfig {
            name: "gmarket".to_string(),
            store_name: "G마켓".to_string(),
            search_url: "https://browse.gmarket.co.kr/search?keyword={keyword}".to_string(),
            api_base: None,
            redirect_hosts: Vec::new(),
            redirect_param: default_redirect_param(),
            id_pattern: r"[?&]goodscode=(\d+)".to_string(),
            max_results: None,
            enabled: true,
        },
        MarketplaceConfig {
            name: "auction".to_string(),
            store_name: "옥션".to_string(),
            search_url: "https://browse.auction.co.kr/search?keyword={keyword}".to_string(),
            api_base: None,
            redirect_hosts: Vec::new(),
            redirect_param: default_redirect_param(),
            id_pattern: r"(?i)[?&]itemno=([A-Z0-9]+)".to_string(),
            max_results: Some(20),
            enabled: true,
        },
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            storage: StorageConfig::default(),
            pipeline: PipelineConfig::default(),
            marketplaces: default_marketplaces(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            render_deadline_secs: default_render_deadline_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            pass_delay_ms: default_pass_delay_ms(),
            enrich_timeout_secs: default_enrich_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            run_migrations: true,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            keywords_path: default_keywords_path(),
            selectors_path: default_selectors_path(),
            category_rules_path: None,
            max_results: default_max_results(),
            unresolved: UnresolvedPolicy::default(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("CRAWLER").separator("__"))
            .build()
            .context("Failed to read configuration sources")?;

        cfg.try_deserialize().context("Invalid configuration")
    }

    /// Enabled marketplaces, optionally narrowed to the given names.
    pub fn active_marketplaces(&self, only: &[String]) -> Vec<&MarketplaceConfig> {
        self.marketplaces
            .iter()
            .filter(|m| m.enabled)
            .filter(|m| only.is_empty() || only.iter().any(|o| o.eq_ignore_ascii_case(&m.name)))
            .collect()
    }
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            store_name: String::new(),
            search_url: String::new(),
            api_base: None,
            redirect_hosts: Vec::new(),
            redirect_param: default_redirect_param(),
            id_pattern: default_id_pattern(),
            max_results: None,
            enabled: true,
        }
    }
}
