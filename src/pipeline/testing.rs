//! Test doubles for the pipeline collaborators.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{
    ChangeLogEntry, NewRecord, Observation, ProductRecord, RecordId, RecordUpdate,
};
use crate::services::{NotificationChannel, ProductFeed, ProductObserver};
use crate::storage::{MemoryStorage, RecordStore};

/// Observer answering from a fixed table; unknown URLs fail.
#[derive(Default)]
pub struct StubObserver {
    pages: Mutex<HashMap<String, Observation>>,
}

impl StubObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: &str, observation: Observation) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), observation);
    }
}

#[async_trait]
impl ProductObserver for StubObserver {
    async fn observe(&self, url: &str) -> Result<Observation> {
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::observe(url, "price element not found"))
    }
}

/// Feed returning a fixed URL list.
pub struct StaticFeed(pub Vec<String>);

#[async_trait]
impl ProductFeed for StaticFeed {
    async fn product_urls(&self, _feed_url: &str) -> Vec<String> {
        self.0.clone()
    }
}

/// Channel recording every delivered message.
#[derive(Default)]
pub struct RecordingChannel {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn deliver(&self, message: &str) -> Result<()> {
        if self.fail {
            return Err(AppError::notify("webhook returned 500"));
        }
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Memory store whose operations can be switched to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStorage,
    fail_reads: AtomicBool,
    fail_updates: AtomicBool,
    fail_logs: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub fn fail_logs(&self) {
        self.fail_logs.store(true, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool, what: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if flag.load(Ordering::SeqCst) {
            return Err(AppError::store(format!("{what} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<ProductRecord>> {
        self.check(&self.fail_reads, "read")?;
        self.inner.find_by_url(url).await
    }

    async fn insert(&self, record: &NewRecord) -> Result<ProductRecord> {
        self.check(&self.fail_updates, "insert")?;
        self.inner.insert(record).await
    }

    async fn update(&self, id: &RecordId, update: &RecordUpdate) -> Result<()> {
        self.check(&self.fail_updates, "update")?;
        self.inner.update(id, update).await
    }

    async fn append_log(&self, entry: &ChangeLogEntry) -> Result<()> {
        self.check(&self.fail_logs, "log")?;
        self.inner.append_log(entry).await
    }

    async fn history(&self, id: &RecordId) -> Result<Vec<ChangeLogEntry>> {
        self.check(&self.fail_reads, "read")?;
        self.inner.history(id).await
    }
}
