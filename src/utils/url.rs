// src/utils/url.rs

//! URL helpers for product pages.

/// Fallback display name when a URL has no usable path segment.
const FALLBACK_NAME: &str = "PRODUCT";

/// Last non-empty path segment of a URL.
///
/// # Examples
/// ```
/// use stock_monitor::utils::url::product_slug;
///
/// assert_eq!(
///     product_slug("https://shop.test/produtos/fifa-23-ps4/"),
///     Some("fifa-23-ps4".to_string())
/// );
/// ```
pub fn product_slug(url: &str) -> Option<String> {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };

    path.split('/')
        .filter(|segment| !segment.trim().is_empty())
        .next_back()
        .map(|segment| segment.to_string())
}

/// Human-readable product name derived from the URL slug.
///
/// Hyphens become spaces and the result is upper-cased.
pub fn display_name(url: &str) -> String {
    match product_slug(url) {
        Some(slug) => slug.replace('-', " ").to_uppercase(),
        None => FALLBACK_NAME.to_string(),
    }
}
