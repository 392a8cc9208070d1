// src/services/feed.rs

//! Sitemap feed reader.
//!
//! Downloads a sitemap and keeps the `<url><loc>` entries that look like
//! product pages.

use std::collections::HashSet;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Config, FeedConfig};
use crate::utils::http;

/// Source of candidate product URLs.
#[async_trait]
pub trait ProductFeed: Send + Sync {
    /// Product URLs in feed order. Never fails: errors yield an empty list.
    async fn product_urls(&self, feed_url: &str) -> Vec<String>;
}

/// Rule deciding whether a sitemap entry is a product page.
#[derive(Debug, Clone)]
pub struct ProductUrlFilter {
    marker: String,
    exclude: Vec<Regex>,
}

impl ProductUrlFilter {
    pub fn new(marker: impl Into<String>, exclude_patterns: &[String]) -> Result<Self> {
        let exclude = exclude_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            marker: marker.into(),
            exclude,
        })
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        Self::new(&config.product_marker, &config.exclude_patterns)
    }

    /// Contains the marker, is not the bare listing path, has a slug after
    /// the marker and matches no exclude pattern.
    pub fn matches(&self, url: &str) -> bool {
        let Some(idx) = url.find(&self.marker) else {
            return false;
        };
        if url.ends_with(&self.marker) {
            return false;
        }
        if self.exclude.iter().any(|re| re.is_match(url)) {
            return false;
        }

        let slug = &url[idx + self.marker.len()..];
        !slug.trim().is_empty()
    }
}

/// Extract every `<url><loc>` value from a sitemap document.
pub fn parse_sitemap(xml: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(xml);
    let loc_sel =
        Selector::parse("url > loc")
            .map_err(|e| AppError::selector("url > loc", format!("{e:?}")))?;

    Ok(document
        .select(&loc_sel)
        .map(|loc| loc.text().collect::<String>().trim().to_string())
        .filter(|loc| !loc.is_empty())
        .collect())
}

/// HTTP sitemap reader.
pub struct SitemapReader {
    client: Client,
    filter: ProductUrlFilter,
    timeout_secs: u64,
}

impl SitemapReader {
    pub fn new(client: Client, filter: ProductUrlFilter, timeout_secs: u64) -> Self {
        Self {
            client,
            filter,
            timeout_secs,
        }
    }

    pub fn from_config(client: Client, config: &Config) -> Result<Self> {
        Ok(Self::new(
            client,
            ProductUrlFilter::from_config(&config.feed)?,
            config.http.sitemap_timeout_secs,
        ))
    }

    /// Download and filter the sitemap, surfacing errors.
    pub async fn fetch(&self, feed_url: &str) -> Result<Vec<String>> {
        log::info!("Downloading sitemap from {}", feed_url);
        let xml = http::fetch_text_with_timeout(&self.client, feed_url, self.timeout_secs).await?;

        let entries = parse_sitemap(&xml)?;
        log::debug!("Sitemap lists {} URLs", entries.len());

        Ok(self.select_products(entries))
    }

    /// Keep product URLs, dropping repeats but preserving first-seen order.
    fn select_products(&self, entries: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        entries
            .into_iter()
            .filter(|url| self.filter.matches(url))
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }
}

#[async_trait]
impl ProductFeed for SitemapReader {
    async fn product_urls(&self, feed_url: &str) -> Vec<String> {
        match self.fetch(feed_url).await {
            Ok(urls) => {
                log::info!("Found {} products in sitemap", urls.len());
                urls
            }
            Err(e) => {
                log::error!("Failed to read sitemap {}: {}", feed_url, e);
                Vec::new()
            }
        }
    }
}
