//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Sitemap source and product URL filtering
    #[serde(default)]
    pub feed: FeedConfig,

    /// Product page selectors
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Change alert channel and wording
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Record store backend
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the file if it exists, defaults otherwise.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_if_present(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        log::info!("Loading configuration from {}", path.display());
        Self::load(path).map_err(|e| {
            AppError::config(format!("cannot load {}: {}", path.display(), e))
        })
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary lookup. Empty values count as unset.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(env::SITEMAP_URL) {
            self.feed.sitemap_url = Some(v);
        }
        if let Some(v) = get(env::DISCORD_WEBHOOK_URL) {
            self.notifier.webhook_url = Some(v);
        }
        if let Some(v) = get(env::SUPABASE_URL) {
            self.storage.supabase_url = Some(v);
        }
        if let Some(v) = get(env::SUPABASE_KEY) {
            self.storage.supabase_key = Some(v);
        }
        if let Some(v) = get(env::STORAGE_BACKEND) {
            match v.to_lowercase().as_str() {
                "local" => self.storage.backend = StorageBackend::Local,
                "supabase" => self.storage.backend = StorageBackend::Supabase,
                other => log::warn!("Ignoring unknown {}={}", env::STORAGE_BACKEND, other),
            }
        }
        if let Some(v) = get(env::STORAGE_DIR) {
            self.storage.dir = PathBuf::from(v);
        }
    }

    /// The sitemap address; its absence is fatal.
    pub fn require_feed_url(&self) -> Result<&str> {
        self.feed
            .sitemap_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppError::config(format!(
                    "{} is not set (feed.sitemap_url in the config file)",
                    env::SITEMAP_URL
                ))
            })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.sitemap_timeout_secs == 0 {
            return Err(AppError::validation("http.sitemap_timeout_secs must be > 0"));
        }
        if self.feed.product_marker.trim().is_empty() {
            return Err(AppError::validation("feed.product_marker is empty"));
        }
        for pattern in &self.feed.exclude_patterns {
            regex::Regex::new(pattern)?;
        }
        for selector in [
            &self.observer.price_selector,
            &self.observer.buy_button_selector,
            &self.observer.variant_selector,
            &self.observer.variants_selector,
        ] {
            scraper::Selector::parse(selector)
                .map_err(|e| AppError::selector(selector.as_str(), format!("{e:?}")))?;
        }
        if StrftimeItems::new(&self.notifier.labels.date_format)
            .any(|item| matches!(item, Item::Error))
        {
            return Err(AppError::validation(format!(
                "notifier.labels.date_format '{}' is not a valid strftime format",
                self.notifier.labels.date_format
            )));
        }
        if self.storage.backend == StorageBackend::Supabase
            && (self.storage.supabase_url.is_none() || self.storage.supabase_key.is_none())
        {
            return Err(AppError::config(format!(
                "supabase backend requires {} and {}",
                env::SUPABASE_URL,
                env::SUPABASE_KEY
            )));
        }
        Ok(())
    }
}

/// Environment variable names.
pub mod env {
    pub const SITEMAP_URL: &str = "SITEMAP_URL";
    pub const DISCORD_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";
    pub const SUPABASE_URL: &str = "SUPABASE_URL";
    pub const SUPABASE_KEY: &str = "SUPABASE_KEY";
    pub const STORAGE_BACKEND: &str = "MONITOR_STORAGE_BACKEND";
    pub const STORAGE_DIR: &str = "MONITOR_STORAGE_DIR";
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Product page timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Sitemap download timeout in seconds
    #[serde(default = "defaults::sitemap_timeout")]
    pub sitemap_timeout_secs: u64,

    /// Webhook delivery timeout in seconds
    #[serde(default = "defaults::webhook_timeout")]
    pub webhook_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            sitemap_timeout_secs: defaults::sitemap_timeout(),
            webhook_timeout_secs: defaults::webhook_timeout(),
        }
    }
}

/// Sitemap source and product URL rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Sitemap address (mandatory, usually from `SITEMAP_URL`)
    #[serde(default)]
    pub sitemap_url: Option<String>,

    /// Path marker that product URLs contain
    #[serde(default = "defaults::product_marker")]
    pub product_marker: String,

    /// Regex patterns for URLs that must be skipped even if they carry the marker
    #[serde(default = "defaults::exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            sitemap_url: None,
            product_marker: defaults::product_marker(),
            exclude_patterns: defaults::exclude_patterns(),
        }
    }
}

/// Selectors and marker strings for reading a product page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Element holding the displayed price
    #[serde(default = "defaults::price_selector")]
    pub price_selector: String,

    /// Buy button whose `value` tells whether the variant is in stock
    #[serde(default = "defaults::buy_button_selector")]
    pub buy_button_selector: String,

    /// Substring of the buy button value meaning "out of stock" (case-insensitive)
    #[serde(default = "defaults::out_of_stock_marker")]
    pub out_of_stock_marker: String,

    /// Variant picker; its presence means a secondary variant exists
    #[serde(default = "defaults::variant_selector")]
    pub variant_selector: String,

    /// Element carrying the variants JSON
    #[serde(default = "defaults::variants_selector")]
    pub variants_selector: String,

    /// Attribute holding the variants JSON
    #[serde(default = "defaults::variants_attr")]
    pub variants_attr: String,

    /// Option name of the secondary variant
    #[serde(default = "defaults::secondary_option")]
    pub secondary_option: String,

    /// Price text recorded when a variant cannot be read
    #[serde(default = "defaults::unavailable_price")]
    pub unavailable_price: String,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            price_selector: defaults::price_selector(),
            buy_button_selector: defaults::buy_button_selector(),
            out_of_stock_marker: defaults::out_of_stock_marker(),
            variant_selector: defaults::variant_selector(),
            variants_selector: defaults::variants_selector(),
            variants_attr: defaults::variants_attr(),
            secondary_option: defaults::secondary_option(),
            unavailable_price: defaults::unavailable_price(),
        }
    }
}

/// Change alert settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Webhook address; alerts are disabled when unset
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default)]
    pub labels: AlertLabels,
}

/// Wording of a change alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertLabels {
    pub headline: String,
    pub product: String,
    pub url: String,
    pub primary: String,
    pub secondary: String,
    pub price: String,
    pub stock: String,
    pub in_stock: String,
    pub out_of_stock: String,
    pub no_change: String,
    pub date: String,
    /// chrono format string for the alert timestamp (local time)
    pub date_format: String,
}

impl Default for AlertLabels {
    fn default() -> Self {
        Self {
            headline: "🔔 **CHANGE DETECTED!**".into(),
            product: "🎮 **Product:**".into(),
            url: "🔗 **URL:**".into(),
            primary: "📌 **PRIMARY:**".into(),
            secondary: "📌 **SECONDARY:**".into(),
            price: "Price:".into(),
            stock: "Stock:".into(),
            in_stock: "✅ In stock".into(),
            out_of_stock: "❌ Out of stock".into(),
            no_change: "(no change)".into(),
            date: "⏰ **Date:**".into(),
            date_format: "%d/%m/%Y %H:%M:%S".into(),
        }
    }
}

/// Available record store backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON files in a local directory
    #[default]
    Local,
    /// Supabase (PostgREST) tables
    Supabase,
}

/// Record store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory of the local backend
    #[serde(default = "defaults::storage_dir")]
    pub dir: PathBuf,

    #[serde(default)]
    pub supabase_url: Option<String>,

    #[serde(default)]
    pub supabase_key: Option<String>,

    /// Table holding one row per product URL
    #[serde(default = "defaults::records_table")]
    pub records_table: String,

    /// Append-only change log table
    #[serde(default = "defaults::log_table")]
    pub log_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            dir: defaults::storage_dir(),
            supabase_url: None,
            supabase_key: None,
            records_table: defaults::records_table(),
            log_table: defaults::log_table(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn sitemap_timeout() -> u64 {
        15
    }
    pub fn webhook_timeout() -> u64 {
        10
    }

    // Feed defaults
    pub fn product_marker() -> String {
        "/produtos/".into()
    }
    pub fn exclude_patterns() -> Vec<String> {
        vec!["/br/produtos/".into()]
    }

    // Observer defaults
    pub fn price_selector() -> String {
        "#price_display".into()
    }
    pub fn buy_button_selector() -> String {
        r#"[data-store="product-buy-button"]"#.into()
    }
    pub fn out_of_stock_marker() -> String {
        "sem estoque".into()
    }
    pub fn variant_selector() -> String {
        r#"[data-variant-id="variation_1"]"#.into()
    }
    pub fn variants_selector() -> String {
        "[data-variants]".into()
    }
    pub fn variants_attr() -> String {
        "data-variants".into()
    }
    pub fn secondary_option() -> String {
        "SECUNDÁRIA".into()
    }
    pub fn unavailable_price() -> String {
        "Indisponível".into()
    }

    // Storage defaults
    pub fn storage_dir() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn records_table() -> String {
        "games".into()
    }
    pub fn log_table() -> String {
        "games_logs".into()
    }
}
