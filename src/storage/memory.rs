//! In-memory record store.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{ChangeLogEntry, NewRecord, ProductRecord, RecordId, RecordUpdate};
use crate::storage::RecordStore;

#[derive(Debug, Default)]
struct State {
    records: Vec<ProductRecord>,
    log: Vec<ChangeLogEntry>,
    next_id: u64,
}

/// Process-local store with sequential numeric ids.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of all records.
    pub fn records(&self) -> Vec<ProductRecord> {
        self.lock().records.clone()
    }

    /// Snapshot of the whole change log.
    pub fn change_log(&self) -> Vec<ChangeLogEntry> {
        self.lock().log.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStorage {
    async fn find_by_url(&self, url: &str) -> Result<Option<ProductRecord>> {
        Ok(self.lock().records.iter().find(|r| r.url == url).cloned())
    }

    async fn insert(&self, record: &NewRecord) -> Result<ProductRecord> {
        let mut state = self.lock();
        if state.records.iter().any(|r| r.url == record.url) {
            return Err(AppError::store(format!(
                "record already exists for {}",
                record.url
            )));
        }

        state.next_id += 1;
        let stored = ProductRecord {
            id: RecordId::new(state.next_id.to_string()),
            url: record.url.clone(),
            fields: record.fields.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        };
        state.records.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: &RecordId, update: &RecordUpdate) -> Result<()> {
        let mut state = self.lock();
        let record = state
            .records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| AppError::store(format!("no record with id {id}")))?;

        record.fields = update.fields.clone();
        record.updated_at = update.updated_at;
        Ok(())
    }

    async fn append_log(&self, entry: &ChangeLogEntry) -> Result<()> {
        self.lock().log.push(entry.clone());
        Ok(())
    }

    async fn history(&self, id: &RecordId) -> Result<Vec<ChangeLogEntry>> {
        Ok(self
            .lock()
            .log
            .iter()
            .filter(|e| &e.game_id == id)
            .cloned()
            .collect())
    }
}
