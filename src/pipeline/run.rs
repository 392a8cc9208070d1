// src/pipeline/run.rs

//! Monitoring run: read the feed, reconcile every product URL in order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::Config;
use crate::pipeline::{ReconcileOutcome, Reconciler};
use crate::services::{DiscordWebhook, HtmlObserver, Notifier, ProductFeed, SitemapReader};
use crate::storage;
use crate::utils::{http, log as run_log};

/// Counters for one monitoring run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total: usize,
    pub created: usize,
    pub unchanged: usize,
    pub updated: usize,
    pub skipped: usize,
    /// URLs whose reconciliation hit a store error
    pub failed: usize,
}

impl RunSummary {
    fn started(total: usize) -> Self {
        let now = Utc::now();
        Self {
            start_time: now,
            end_time: now,
            total,
            created: 0,
            unchanged: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
        }
    }

    /// Count one reconciliation result.
    pub fn record(&mut self, result: &Result<ReconcileOutcome>) {
        match result {
            Ok(ReconcileOutcome::Created) => self.created += 1,
            Ok(ReconcileOutcome::Unchanged) => self.unchanged += 1,
            Ok(ReconcileOutcome::Updated(_)) => self.updated += 1,
            Ok(ReconcileOutcome::Skipped(_)) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }

    pub fn duration_secs(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds()
    }

    fn log(&self) {
        run_log::summary(
            "Monitoring run",
            &[
                ("Products", self.total.to_string()),
                ("Created", self.created.to_string()),
                ("Unchanged", self.unchanged.to_string()),
                ("Updated", self.updated.to_string()),
                ("Skipped", self.skipped.to_string()),
                ("Failed", self.failed.to_string()),
                ("Duration", format!("{}s", self.duration_secs())),
            ],
        );
    }
}

/// Drives the reconciler over every URL the feed yields.
pub struct Monitor {
    feed: Arc<dyn ProductFeed>,
    reconciler: Reconciler,
    feed_url: String,
}

impl Monitor {
    pub fn new(
        feed: Arc<dyn ProductFeed>,
        reconciler: Reconciler,
        feed_url: impl Into<String>,
    ) -> Self {
        Self {
            feed,
            reconciler,
            feed_url: feed_url.into(),
        }
    }

    /// One full pass. Per-URL failures never abort the run.
    pub async fn run(&self) -> RunSummary {
        run_log::header("Stock monitor");

        run_log::step(1, 2, "Reading product feed");
        let urls = self.feed.product_urls(&self.feed_url).await;
        run_log::sub_item(&format!("{} product URL(s)", urls.len()));

        let mut summary = RunSummary::started(urls.len());

        run_log::step(2, 2, "Reconciling products");
        for (i, url) in urls.iter().enumerate() {
            run_log::separator();
            log::info!("({}/{}) {}", i + 1, urls.len(), url);

            let result = self.reconciler.reconcile(url).await;
            match &result {
                Ok(ReconcileOutcome::Skipped(reason)) => {
                    run_log::sub_item(&format!("skipped: {}", reason));
                }
                Ok(_) => {}
                Err(e) => log::error!("Failed to reconcile {}: {}", url, e),
            }
            summary.record(&result);
        }

        summary.end_time = Utc::now();
        run_log::separator();
        summary.log();
        summary
    }
}

/// Build the production collaborators from config and run once.
///
/// Fails only when the run cannot start: missing feed URL, bad selectors,
/// or an unusable store configuration.
pub async fn run_monitor(config: &Config) -> Result<RunSummary> {
    let feed_url = config.require_feed_url()?.to_string();
    config.validate()?;

    let client = http::create_async_client(&config.http)?;
    let store = storage::open(&config.storage, &client)?;
    let observer = Arc::new(HtmlObserver::new(client.clone(), config.observer.clone())?);
    let feed = Arc::new(SitemapReader::from_config(client.clone(), config)?);

    let notifier = match &config.notifier.webhook_url {
        Some(webhook_url) => {
            let channel = DiscordWebhook::new(
                client.clone(),
                webhook_url.clone(),
                config.http.webhook_timeout_secs,
            );
            Some(Notifier::new(Arc::new(channel), config.notifier.labels.clone()))
        }
        None => {
            log::warn!("No webhook configured; changes will not be announced");
            None
        }
    };

    let reconciler = Reconciler::new(observer, store, notifier);
    Ok(Monitor::new(feed, reconciler, feed_url).run().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{Observation, VariantState};
    use crate::pipeline::SkipReason;
    use crate::pipeline::testing::{FlakyStore, RecordingChannel, StaticFeed, StubObserver};
    use crate::storage::MemoryStorage;

    fn obs(url: &str, price: &str) -> Observation {
        Observation::new(
            url,
            VariantState::new(price, true),
            VariantState::new("Indisponível", false),
        )
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_feed_reconciles_nothing() {
        let store = Arc::new(FlakyStore::new());
        let reconciler = Reconciler::new(Arc::new(StubObserver::new()), store.clone(), None);
        let monitor = Monitor::new(
            Arc::new(StaticFeed(vec![])),
            reconciler,
            "https://shop.test/sitemap.xml",
        );

        let summary = monitor.run().await;
        assert_eq!(summary.total, 0);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_page_does_not_stop_the_run() {
        let (a, c) = ("https://shop.test/produtos/a/", "https://shop.test/produtos/c/");
        let observer = Arc::new(StubObserver::new());
        observer.set(a, obs(a, "$1"));
        observer.set(c, obs(c, "$3"));
        let store = Arc::new(MemoryStorage::new());

        let feed = StaticFeed(urls(&[a, "https://shop.test/produtos/b/", c]));
        let reconciler = Reconciler::new(observer, store.clone(), None);
        let summary = Monitor::new(Arc::new(feed), reconciler, "feed").run().await;

        assert_eq!(summary.total, 3);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.skipped, 1);
        let stored: Vec<String> = store.records().into_iter().map(|r| r.url).collect();
        assert_eq!(stored, urls(&[a, c]));
    }

    #[tokio::test]
    async fn test_second_run_reports_updates() {
        let url = "https://shop.test/produtos/a/";
        let observer = Arc::new(StubObserver::new());
        let store = Arc::new(MemoryStorage::new());
        let channel = Arc::new(RecordingChannel::new());
        observer.set(url, obs(url, "$1"));

        let notifier = Notifier::new(channel.clone(), Default::default());
        let reconciler = Reconciler::new(observer.clone(), store, Some(notifier));
        let monitor = Monitor::new(Arc::new(StaticFeed(urls(&[url]))), reconciler, "feed");

        assert_eq!(monitor.run().await.created, 1);
        assert_eq!(monitor.run().await.unchanged, 1);

        observer.set(url, obs(url, "$2"));
        let summary = monitor.run().await;
        assert_eq!(summary.updated, 1);
        assert_eq!(channel.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_store_errors_are_counted_as_failed() {
        let url = "https://shop.test/produtos/a/";
        let observer = Arc::new(StubObserver::new());
        observer.set(url, obs(url, "$1"));
        let store = Arc::new(FlakyStore::new());
        store.fail_reads();

        let reconciler = Reconciler::new(observer, store, None);
        let feed = Arc::new(StaticFeed(urls(&[url, url])));
        let summary = Monitor::new(feed, reconciler, "feed").run().await;

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.created, 0);
    }

    #[test]
    fn test_summary_record() {
        let mut summary = RunSummary::started(4);
        summary.record(&Ok(ReconcileOutcome::Created));
        summary.record(&Ok(ReconcileOutcome::Skipped(SkipReason::ScrapeFailed)));
        summary.record(&Ok(ReconcileOutcome::Updated(vec![])));
        summary.record(&Err(AppError::store("down")));

        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.unchanged, 0);
    }

    #[tokio::test]
    async fn test_run_monitor_requires_feed_url() {
        let err = run_monitor(&Config::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
