//! Reconciliation of one product URL.
//!
//! Runs the stages Observe → Lookup → Detect → Persist → Notify. Each stage
//! either hands a typed value to the next or ends the pass with an outcome:
//!
//! - observer failure: `Skipped`, nothing is read or written
//! - unseen URL: record inserted, `Created`, no log rows, no alert
//! - identical fields: `Unchanged`, no writes
//! - differing fields: log rows, record update, alert, `Updated`
//!
//! Store read/insert/update failures are returned as errors and stop the
//! pass before any alert. Log-row and alert failures are only logged.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    Change, ChangeLogEntry, NewRecord, Observation, ProductRecord, RecordFields, RecordUpdate,
};
use crate::pipeline::detect_changes;
use crate::services::{ChangeAlert, Notifier, ProductObserver};
use crate::storage::RecordStore;

/// Why a URL produced no state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ScrapeFailed,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::ScrapeFailed => "scrape-failed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of reconciling one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Skipped(SkipReason),
    Created,
    Unchanged,
    Updated(Vec<Change>),
}

/// Outcome of the lookup stage.
enum Lookup {
    FirstSight,
    Known(ProductRecord),
}

/// Compares observations with stored records and applies the transition.
pub struct Reconciler {
    observer: Arc<dyn ProductObserver>,
    store: Arc<dyn RecordStore>,
    notifier: Option<Notifier>,
}

impl Reconciler {
    /// `notifier: None` disables alerts; everything else still runs.
    pub fn new(
        observer: Arc<dyn ProductObserver>,
        store: Arc<dyn RecordStore>,
        notifier: Option<Notifier>,
    ) -> Self {
        Self {
            observer,
            store,
            notifier,
        }
    }

    /// Reconcile a single product URL.
    pub async fn reconcile(&self, url: &str) -> Result<ReconcileOutcome> {
        let Some(observation) = self.observe(url).await else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::ScrapeFailed));
        };
        let now = Utc::now();

        let record = match self.lookup(url).await? {
            Lookup::FirstSight => {
                self.create(&observation, now).await?;
                return Ok(ReconcileOutcome::Created);
            }
            Lookup::Known(record) => record,
        };

        let changes = detect_changes(&record, &observation);
        if changes.is_empty() {
            log::info!("No changes for {}", url);
            return Ok(ReconcileOutcome::Unchanged);
        }

        log::info!("{} change(s) detected for {}", changes.len(), url);
        self.persist(&record, &observation, &changes, now).await?;
        self.notify(url, &record, &observation, &changes, now).await;

        Ok(ReconcileOutcome::Updated(changes))
    }

    async fn observe(&self, url: &str) -> Option<Observation> {
        match self.observer.observe(url).await {
            Ok(observation) => Some(observation),
            Err(e) => {
                log::warn!("Skipping {}: {}", url, e);
                None
            }
        }
    }

    async fn lookup(&self, url: &str) -> Result<Lookup> {
        Ok(match self.store.find_by_url(url).await? {
            Some(record) => Lookup::Known(record),
            None => Lookup::FirstSight,
        })
    }

    async fn create(&self, observation: &Observation, now: DateTime<Utc>) -> Result<()> {
        let record = self
            .store
            .insert(&NewRecord::from_observation(observation, now))
            .await?;
        log::info!("New product registered: {} (id {})", record.url, record.id);
        Ok(())
    }

    /// Log rows first, then the record itself.
    async fn persist(
        &self,
        record: &ProductRecord,
        observation: &Observation,
        changes: &[Change],
        now: DateTime<Utc>,
    ) -> Result<()> {
        for change in changes {
            log::info!("  {}", change);
            let entry = ChangeLogEntry::from_change(&record.id, change, now);
            if let Err(e) = self.store.append_log(&entry).await {
                log::error!(
                    "Failed to log {} change for record {}: {}",
                    change.field,
                    record.id,
                    e
                );
            }
        }

        let update = RecordUpdate {
            fields: RecordFields::from(observation),
            updated_at: now,
        };
        self.store.update(&record.id, &update).await?;
        log::debug!("Record {} updated", record.id);
        Ok(())
    }

    async fn notify(
        &self,
        url: &str,
        previous: &ProductRecord,
        current: &Observation,
        changes: &[Change],
        now: DateTime<Utc>,
    ) {
        let Some(notifier) = &self.notifier else {
            log::debug!("No notification channel configured; alert skipped");
            return;
        };

        let alert = ChangeAlert {
            url,
            previous,
            current,
            changes,
            detected_at: now,
        };
        if let Err(e) = notifier.notify(&alert).await {
            log::error!("Failed to deliver alert for {}: {}", url, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{AlertLabels, FieldValue, TrackedField, VariantState};
    use crate::pipeline::testing::{FlakyStore, RecordingChannel, StubObserver};
    use crate::storage::MemoryStorage;

    const URL: &str = "https://shop.test/produtos/fifa-23-ps4/";

    fn obs(pp: &str, ps: bool, sp: &str, ss: bool) -> Observation {
        Observation::new(URL, VariantState::new(pp, ps), VariantState::new(sp, ss))
    }

    fn notifier(channel: &Arc<RecordingChannel>) -> Option<Notifier> {
        Some(Notifier::new(channel.clone(), AlertLabels::default()))
    }

    #[tokio::test]
    async fn test_first_sight_creates_without_log_or_alert() {
        let observer = Arc::new(StubObserver::new());
        let store = Arc::new(MemoryStorage::new());
        let channel = Arc::new(RecordingChannel::new());
        observer.set(URL, obs("$10", true, "$12", false));

        let reconciler = Reconciler::new(observer, store.clone(), notifier(&channel));
        let outcome = reconciler.reconcile(URL).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Created);
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].created_at, records[0].updated_at);
        assert_eq!(records[0].fields.primary_price, "$10");
        assert!(store.change_log().is_empty());
        assert!(channel.messages().is_empty());
    }

    #[tokio::test]
    async fn test_second_pass_without_changes_is_unchanged() {
        let observer = Arc::new(StubObserver::new());
        let store = Arc::new(MemoryStorage::new());
        let channel = Arc::new(RecordingChannel::new());
        observer.set(URL, obs("$10", true, "$12", false));

        let reconciler = Reconciler::new(observer, store.clone(), notifier(&channel));
        reconciler.reconcile(URL).await.unwrap();
        let before = store.records();

        let outcome = reconciler.reconcile(URL).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(store.records(), before);
        assert!(store.change_log().is_empty());
        assert!(channel.messages().is_empty());
    }

    #[tokio::test]
    async fn test_changes_are_logged_persisted_and_notified() {
        let observer = Arc::new(StubObserver::new());
        let store = Arc::new(MemoryStorage::new());
        let channel = Arc::new(RecordingChannel::new());
        let reconciler = Reconciler::new(observer.clone(), store.clone(), notifier(&channel));

        observer.set(URL, obs("$10", true, "$12", false));
        reconciler.reconcile(URL).await.unwrap();

        observer.set(URL, obs("$10", false, "$15", false));
        let outcome = reconciler.reconcile(URL).await.unwrap();

        let ReconcileOutcome::Updated(changes) = outcome else {
            panic!("expected Updated, got {outcome:?}");
        };
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].field, TrackedField::PrimaryStock);
        assert_eq!(changes[1].new_value, FieldValue::Price("$15".into()));

        let record = &store.records()[0];
        assert_eq!(record.fields.primary_price, "$10");
        assert!(!record.fields.primary_stock);
        assert_eq!(record.fields.secondary_price, "$15");
        assert!(!record.fields.secondary_stock);
        assert!(record.updated_at >= record.created_at);

        let log = store.change_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].changed_field, TrackedField::PrimaryStock);
        assert_eq!((log[0].old_value.as_str(), log[0].new_value.as_str()), ("true", "false"));
        assert_eq!(log[1].changed_field, TrackedField::SecondaryPrice);
        assert_eq!((log[1].old_value.as_str(), log[1].new_value.as_str()), ("$12", "$15"));
        assert!(log.iter().all(|e| e.game_id == record.id));

        let messages = channel.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("✅ In stock → **❌ Out of stock**"));
        assert!(messages[0].contains("$12 → **$15**"));
    }

    #[tokio::test]
    async fn test_scrape_failure_is_skipped_without_store_access() {
        let observer = Arc::new(StubObserver::new());
        let store = Arc::new(FlakyStore::new());
        store.fail_reads();

        let reconciler = Reconciler::new(observer, store.clone(), None);
        let outcome = reconciler.reconcile(URL).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Skipped(SkipReason::ScrapeFailed));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_update_failure_sends_no_alert() {
        let observer = Arc::new(StubObserver::new());
        let store = Arc::new(FlakyStore::new());
        let channel = Arc::new(RecordingChannel::new());
        let reconciler = Reconciler::new(observer.clone(), store.clone(), notifier(&channel));

        observer.set(URL, obs("$10", true, "$12", false));
        reconciler.reconcile(URL).await.unwrap();

        store.fail_updates();
        observer.set(URL, obs("$11", true, "$12", false));
        let err = reconciler.reconcile(URL).await.unwrap_err();

        assert!(matches!(err, AppError::Store(_)));
        assert!(channel.messages().is_empty());
        // The log row was written before the failed update
        assert_eq!(store.inner().change_log().len(), 1);
    }

    #[tokio::test]
    async fn test_log_failure_does_not_block_update() {
        let observer = Arc::new(StubObserver::new());
        let store = Arc::new(FlakyStore::new());
        let channel = Arc::new(RecordingChannel::new());
        let reconciler = Reconciler::new(observer.clone(), store.clone(), notifier(&channel));

        observer.set(URL, obs("$10", true, "$12", false));
        reconciler.reconcile(URL).await.unwrap();

        store.fail_logs();
        observer.set(URL, obs("$9", true, "$12", false));
        let outcome = reconciler.reconcile(URL).await.unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Updated(_)));
        assert_eq!(store.inner().records()[0].fields.primary_price, "$9");
        assert!(store.inner().change_log().is_empty());
        assert_eq!(channel.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_alert_failure_keeps_update() {
        let observer = Arc::new(StubObserver::new());
        let store = Arc::new(MemoryStorage::new());
        let channel = Arc::new(RecordingChannel::failing());
        let reconciler = Reconciler::new(observer.clone(), store.clone(), notifier(&channel));

        observer.set(URL, obs("$10", true, "$12", false));
        reconciler.reconcile(URL).await.unwrap();
        observer.set(URL, obs("$10", true, "$12", true));
        let outcome = reconciler.reconcile(URL).await.unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Updated(_)));
        assert!(store.records()[0].fields.secondary_stock);
        assert_eq!(store.change_log().len(), 1);
    }

    #[tokio::test]
    async fn test_without_notifier_changes_still_persist() {
        let observer = Arc::new(StubObserver::new());
        let store = Arc::new(MemoryStorage::new());
        let reconciler = Reconciler::new(observer.clone(), store.clone(), None);

        observer.set(URL, obs("$10", true, "$12", false));
        reconciler.reconcile(URL).await.unwrap();
        observer.set(URL, obs("$20", false, "$22", true));
        let outcome = reconciler.reconcile(URL).await.unwrap();

        let ReconcileOutcome::Updated(changes) = outcome else {
            panic!("expected Updated");
        };
        assert_eq!(changes.len(), 4);
        assert_eq!(store.change_log().len(), 4);
    }

    #[test]
    fn test_skip_reason_label() {
        assert_eq!(SkipReason::ScrapeFailed.to_string(), "scrape-failed");
    }
}
