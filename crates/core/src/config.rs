//! Configuration for the Guardian client, scraping, query bounds and caches.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const API_KEY_ENV: &str = "GUARDIAN_API_KEY";
pub const BASE_URL_ENV: &str = "GUARDIAN_API_BASE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsConfig {
    #[serde(default)]
    pub guardian: GuardianConfig,

    #[serde(default)]
    pub scrape: ScrapeConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl NewsConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist. The API key is never read from the file.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config: Self = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .context("Failed to read configuration file")?;
            toml::from_str(&content).context("Failed to parse configuration file")?
        } else {
            tracing::info!(
                path = %config_path.display(),
                "Configuration file not found, using defaults"
            );
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides, e.g. `std::env::var(..).ok()`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.guardian.api_key = lookup(API_KEY_ENV)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|url| !url.trim().is_empty()) {
            self.guardian.base_url = base_url.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.guardian.base_url()?;

        if self.guardian.timeout_secs == 0 {
            bail!("guardian.timeout_secs must be greater than zero");
        }
        if self.scrape.allowed_hosts.is_empty() {
            bail!("scrape.allowed_hosts must list at least one host");
        }
        if self.query.max_page_size == 0 || self.query.related_max_page_size == 0 {
            bail!("query page size limits must be greater than zero");
        }
        if self.query.trend_max_months == 0 {
            bail!("query.trend_max_months must be greater than zero");
        }

        for (name, store) in self.cache.stores() {
            if store.max_entries == 0 {
                bail!("cache.{}.max_entries must be greater than zero", name);
            }
        }

        Ok(())
    }
}

/// Guardian Content API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Read from the environment only.
    #[serde(skip)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://content.guardianapis.com/".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GuardianConfig {
    /// Parsed base URL, always ending in `/` so endpoint joins append.
    pub fn base_url(&self) -> Result<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).with_context(|| format!("Invalid guardian.base_url: {}", self.base_url))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Article page scraping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Hosts (and their subdomains) that may be scraped.
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_allowed_hosts() -> Vec<String> {
    vec!["theguardian.com".to_string()]
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: default_allowed_hosts(),
            user_agent: default_user_agent(),
        }
    }
}

/// Bounds applied to caller-supplied query parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    #[serde(default = "default_related_page_size")]
    pub related_default_page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub related_max_page_size: u32,

    /// Longest trend range, in calendar months.
    #[serde(default = "default_trend_max_months")]
    pub trend_max_months: usize,
}

fn default_page_size() -> u32 {
    5
}

fn default_max_page_size() -> u32 {
    50
}

fn default_related_page_size() -> u32 {
    20
}

fn default_trend_max_months() -> usize {
    36
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            related_default_page_size: default_related_page_size(),
            related_max_page_size: default_max_page_size(),
            trend_max_months: default_trend_max_months(),
        }
    }
}

/// Size and freshness bounds of a single cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub max_entries: usize,
    pub ttl_secs: u64,
}

impl StoreConfig {
    pub const fn new(max_entries: usize, ttl_secs: u64) -> Self {
        Self {
            max_entries,
            ttl_secs,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Per-kind cache store limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_search_store")]
    pub search: StoreConfig,

    #[serde(default = "default_sections_store")]
    pub sections: StoreConfig,

    #[serde(default = "default_article_text_store")]
    pub article_text: StoreConfig,

    #[serde(default = "default_trend_store")]
    pub trend: StoreConfig,

    #[serde(default = "default_related_topics_store")]
    pub related_topics: StoreConfig,
}

fn default_search_store() -> StoreConfig {
    StoreConfig::new(256, 300)
}

fn default_sections_store() -> StoreConfig {
    StoreConfig::new(32, 3600)
}

fn default_article_text_store() -> StoreConfig {
    StoreConfig::new(128, 1800)
}

fn default_trend_store() -> StoreConfig {
    StoreConfig::new(64, 600)
}

fn default_related_topics_store() -> StoreConfig {
    StoreConfig::new(64, 600)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search: default_search_store(),
            sections: default_sections_store(),
            article_text: default_article_text_store(),
            trend: default_trend_store(),
            related_topics: default_related_topics_store(),
        }
    }
}

impl CacheConfig {
    pub fn stores(&self) -> [(&'static str, StoreConfig); 5] {
        [
            ("search", self.search),
            ("sections", self.sections),
            ("article_text", self.article_text),
            ("trend", self.trend),
            ("related_topics", self.related_topics),
        ]
    }
}
