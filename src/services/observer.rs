// src/services/observer.rs

//! Product page observer.
//!
//! Reads the default (primary) variant straight from the rendered price and
//! buy button, and the secondary variant from the variants JSON the
//! storefront embeds in the product form.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Observation, ObserverConfig, VariantState};
use crate::utils::http;

/// Produces a fresh observation for a product URL.
#[async_trait]
pub trait ProductObserver: Send + Sync {
    /// Any error means the page could not be observed.
    async fn observe(&self, url: &str) -> Result<Observation>;
}

/// Parsed selectors, compiled once per observer.
struct PageSelectors {
    price: Selector,
    buy_button: Selector,
    variant: Selector,
    variants: Selector,
}

impl PageSelectors {
    fn compile(config: &ObserverConfig) -> Result<Self> {
        Ok(Self {
            price: parse_selector(&config.price_selector)?,
            buy_button: parse_selector(&config.buy_button_selector)?,
            variant: parse_selector(&config.variant_selector)?,
            variants: parse_selector(&config.variants_selector)?,
        })
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Observer that downloads the product page and reads it with CSS selectors.
pub struct HtmlObserver {
    client: Client,
    config: ObserverConfig,
    selectors: PageSelectors,
}

impl HtmlObserver {
    pub fn new(client: Client, config: ObserverConfig) -> Result<Self> {
        let selectors = PageSelectors::compile(&config)?;
        Ok(Self {
            client,
            config,
            selectors,
        })
    }

    /// Build an observation from an already downloaded page.
    pub fn parse(&self, url: &str, html: &str) -> Result<Observation> {
        let document = Html::parse_document(html);

        let primary = self
            .read_primary(&document)
            .ok_or_else(|| AppError::observe(url, "price element not found"))?;
        log::debug!(
            "Primary - price: {} | in stock: {}",
            primary.price,
            primary.stock
        );

        let secondary = self.read_secondary(&document);
        log::debug!(
            "Secondary - price: {} | in stock: {}",
            secondary.price,
            secondary.stock
        );

        Ok(Observation::new(url, primary, secondary))
    }

    /// The preselected variant. `None` when the page has no price at all.
    fn read_primary(&self, document: &Html) -> Option<VariantState> {
        let price_elem = document.select(&self.selectors.price).next()?;
        let price = price_elem.text().collect::<String>().trim().to_string();

        let button_value = document
            .select(&self.selectors.buy_button)
            .next()
            .and_then(|button| button.value().attr("value"));

        Some(VariantState::new(price, self.is_in_stock(button_value)))
    }

    fn read_secondary(&self, document: &Html) -> VariantState {
        if document.select(&self.selectors.variant).next().is_none() {
            log::debug!("Product has no secondary variant");
            return self.unavailable();
        }

        let variants = document
            .select(&self.selectors.variants)
            .next()
            .and_then(|elem| elem.value().attr(&self.config.variants_attr))
            .and_then(|raw| serde_json::from_str::<Vec<Value>>(raw).ok());

        let Some(variants) = variants else {
            log::warn!("Variant picker present but variants data is missing or invalid");
            return self.unavailable();
        };

        match find_variant(&variants, &self.config.secondary_option) {
            Some(entry) => {
                let price = entry
                    .get("price_short")
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|| self.config.unavailable_price.clone());
                let stock = entry
                    .get("available")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                VariantState::new(price, stock)
            }
            None => {
                log::warn!(
                    "No variant named '{}' in variants data",
                    self.config.secondary_option
                );
                self.unavailable()
            }
        }
    }

    /// A missing buy button counts as out of stock.
    fn is_in_stock(&self, button_value: Option<&str>) -> bool {
        let marker = self.config.out_of_stock_marker.to_lowercase();
        button_value
            .map(|value| !value.to_lowercase().contains(&marker))
            .unwrap_or(false)
    }

    fn unavailable(&self) -> VariantState {
        VariantState::new(self.config.unavailable_price.clone(), false)
    }
}

/// Variant entry whose `option0..optionN` contains `name` (case-insensitive).
fn find_variant<'a>(variants: &'a [Value], name: &str) -> Option<&'a Value> {
    let wanted = name.trim().to_lowercase();
    variants.iter().find(|entry| {
        entry.as_object().is_some_and(|obj| {
            obj.iter()
                .filter(|(key, _)| key.starts_with("option"))
                .filter_map(|(_, value)| value.as_str())
                .any(|value| value.trim().to_lowercase() == wanted)
        })
    })
}

#[async_trait]
impl ProductObserver for HtmlObserver {
    async fn observe(&self, url: &str) -> Result<Observation> {
        log::info!("Observing product: {}", url);
        let html = http::fetch_text(&self.client, url)
            .await
            .map_err(|e| AppError::observe(url, e))?;
        self.parse(url, &html)
    }
}
