//! Local filesystem record store.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── records.json          # One record per product URL
//! └── changelog.jsonl       # Append-only change log, one JSON row per line
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{ChangeLogEntry, NewRecord, ProductRecord, RecordId, RecordUpdate};
use crate::storage::RecordStore;

const RECORDS_KEY: &str = "records.json";
const CHANGELOG_KEY: &str = "changelog.jsonl";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn load_records(&self) -> Result<Vec<ProductRecord>> {
        Ok(self.read_json(RECORDS_KEY).await?.unwrap_or_default())
    }

    /// Stable id derived from the URL.
    fn record_id(url: &str) -> RecordId {
        let digest = Sha256::digest(url.as_bytes());
        RecordId::new(hex::encode(&digest[..8]))
    }
}

#[async_trait]
impl RecordStore for LocalStorage {
    async fn find_by_url(&self, url: &str) -> Result<Option<ProductRecord>> {
        let records = self.load_records().await?;
        Ok(records.into_iter().find(|r| r.url == url))
    }

    async fn insert(&self, record: &NewRecord) -> Result<ProductRecord> {
        let mut records = self.load_records().await?;
        if records.iter().any(|r| r.url == record.url) {
            return Err(AppError::store(format!(
                "record already exists for {}",
                record.url
            )));
        }

        let stored = ProductRecord {
            id: Self::record_id(&record.url),
            url: record.url.clone(),
            fields: record.fields.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        };
        records.push(stored.clone());
        self.write_json(RECORDS_KEY, &records).await?;

        log::debug!("Inserted record {} for {}", stored.id, stored.url);
        Ok(stored)
    }

    async fn update(&self, id: &RecordId, update: &RecordUpdate) -> Result<()> {
        let mut records = self.load_records().await?;
        let record = records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| AppError::store(format!("no record with id {id}")))?;

        record.fields = update.fields.clone();
        record.updated_at = update.updated_at;
        self.write_json(RECORDS_KEY, &records).await
    }

    async fn append_log(&self, entry: &ChangeLogEntry) -> Result<()> {
        let path = self.path(CHANGELOG_KEY);
        self.ensure_dir(&path).await?;

        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn history(&self, id: &RecordId) -> Result<Vec<ChangeLogEntry>> {
        let Some(bytes) = self.read_bytes(CHANGELOG_KEY).await? else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for line in bytes.split(|b| *b == b'\n') {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let entry: ChangeLogEntry = serde_json::from_slice(line)?;
            if &entry.game_id == id {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Observation, RecordFields, TrackedField, VariantState};
    use chrono::Utc;
    use tempfile::TempDir;

    const URL: &str = "https://shop.test/produtos/halo-3/";

    fn observation() -> Observation {
        Observation::new(
            URL,
            VariantState::new("R$ 99,90", true),
            VariantState::new("Indisponível", false),
        )
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_find_in_empty_store() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("nested"));

        assert!(storage.find_by_url(URL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_then_find_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let obs = observation();

        let inserted = storage
            .insert(&NewRecord::from_observation(&obs, Utc::now()))
            .await
            .unwrap();
        let found = storage.find_by_url(URL).await.unwrap().unwrap();

        assert_eq!(found, inserted);
        assert_eq!(found.fields, RecordFields::from(&obs));
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let record = NewRecord::from_observation(&observation(), Utc::now());

        storage.insert(&record).await.unwrap();
        let err = storage.insert(&record).await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
    }

    #[tokio::test]
    async fn test_update_fields() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let inserted = storage
            .insert(&NewRecord::from_observation(&observation(), Utc::now()))
            .await
            .unwrap();

        let mut fields = inserted.fields.clone();
        fields.primary_stock = false;
        let later = Utc::now();
        storage
            .update(
                &inserted.id,
                &RecordUpdate {
                    fields: fields.clone(),
                    updated_at: later,
                },
            )
            .await
            .unwrap();

        let found = storage.find_by_url(URL).await.unwrap().unwrap();
        assert_eq!(found.fields, fields);
        assert_eq!(found.updated_at, later);
        assert_eq!(found.created_at, inserted.created_at);
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let update = RecordUpdate {
            fields: RecordFields::from(&observation()),
            updated_at: Utc::now(),
        };

        assert!(storage.update(&RecordId::new("missing"), &update).await.is_err());
    }

    #[tokio::test]
    async fn test_change_log_is_appended_per_record() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let now = Utc::now();

        let entry = |id: &str, field, old: &str, new: &str| ChangeLogEntry {
            game_id: RecordId::new(id),
            changed_field: field,
            old_value: old.to_string(),
            new_value: new.to_string(),
            changed_at: now,
        };

        storage
            .append_log(&entry("a", TrackedField::PrimaryPrice, "$1", "$2"))
            .await
            .unwrap();
        storage
            .append_log(&entry("b", TrackedField::PrimaryStock, "true", "false"))
            .await
            .unwrap();
        storage
            .append_log(&entry("a", TrackedField::SecondaryStock, "false", "true"))
            .await
            .unwrap();

        let history = storage.history(&RecordId::new("a")).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].changed_field, TrackedField::PrimaryPrice);
        assert_eq!(history[1].changed_field, TrackedField::SecondaryStock);
        assert!(storage.history(&RecordId::new("c")).await.unwrap().is_empty());
    }
}
