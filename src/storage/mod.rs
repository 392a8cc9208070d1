//! Record store abstractions.
//!
//! One record per product URL plus an append-only change log.
//!
//! ## Backends
//!
//! - `LocalStorage`: JSON files in a directory (development, single host)
//! - `SupabaseStorage`: PostgREST tables (`games`, `games_logs`)
//! - `MemoryStorage`: process-local, for tests

pub mod local;
pub mod memory;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{
    ChangeLogEntry, NewRecord, ProductRecord, RecordId, RecordUpdate, StorageBackend,
    StorageConfig,
};

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use supabase::SupabaseStorage;

/// Persistence for product records keyed by URL.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Look up the record for a URL.
    async fn find_by_url(&self, url: &str) -> Result<Option<ProductRecord>>;

    /// Persist a first-sight record; the store assigns its id.
    async fn insert(&self, record: &NewRecord) -> Result<ProductRecord>;

    /// Overwrite the comparable fields and `updated_at` of a record.
    async fn update(&self, id: &RecordId, update: &RecordUpdate) -> Result<()>;

    /// Append one change-log row.
    async fn append_log(&self, entry: &ChangeLogEntry) -> Result<()>;

    /// Change-log rows of a record in append order.
    async fn history(&self, id: &RecordId) -> Result<Vec<ChangeLogEntry>>;
}

/// Open the configured backend.
pub fn open(config: &StorageConfig, client: &reqwest::Client) -> Result<Arc<dyn RecordStore>> {
    match config.backend {
        StorageBackend::Local => {
            log::info!("Using local record store at {}", config.dir.display());
            Ok(Arc::new(LocalStorage::new(&config.dir)))
        }
        StorageBackend::Supabase => {
            let (Some(url), Some(key)) = (&config.supabase_url, &config.supabase_key) else {
                return Err(AppError::config(
                    "supabase backend requires SUPABASE_URL and SUPABASE_KEY",
                ));
            };
            log::info!("Using Supabase record store at {}", url);
            Ok(Arc::new(SupabaseStorage::new(
                client.clone(),
                url,
                key,
                &config.records_table,
                &config.log_table,
            )))
        }
    }
}
