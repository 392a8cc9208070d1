//! Service layer: the I/O collaborators around the reconciliation core.
//!
//! - Sitemap feed reading (`SitemapReader`)
//! - Product page observation (`HtmlObserver`)
//! - Change alert rendering and delivery (`Notifier`, `DiscordWebhook`)

mod feed;
mod notifier;
mod observer;

pub use feed::{ProductFeed, ProductUrlFilter, SitemapReader, parse_sitemap};
pub use notifier::{ChangeAlert, DiscordWebhook, NotificationChannel, Notifier};
pub use observer::{HtmlObserver, ProductObserver};
