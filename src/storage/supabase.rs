//! Supabase (PostgREST) record store.
//!
//! Records live in one row per URL (`url` unique); the change log is an
//! append-only table referencing the record id through `game_id`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::models::{ChangeLogEntry, NewRecord, ProductRecord, RecordId, RecordUpdate};
use crate::storage::RecordStore;

/// Supabase REST storage backend.
#[derive(Clone)]
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    api_key: String,
    records_table: String,
    log_table: String,
}

impl SupabaseStorage {
    pub fn new(
        client: Client,
        base_url: &str,
        api_key: &str,
        records_table: &str,
        log_table: &str,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            records_table: records_table.to_string(),
            log_table: log_table.to_string(),
        }
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Send a request, turning transport errors and non-2xx replies into store errors.
    async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| AppError::store(format!("{context}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::store(format!("{context}: {status} {body}")));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T> {
        self.send(request, context)
            .await?
            .json::<T>()
            .await
            .map_err(|e| AppError::store(format!("{context}: {e}")))
    }
}

#[async_trait]
impl RecordStore for SupabaseStorage {
    async fn find_by_url(&self, url: &str) -> Result<Option<ProductRecord>> {
        let request = self
            .client
            .get(self.endpoint(&self.records_table))
            .query(&[("select", "*".to_string()), ("url", format!("eq.{url}"))]);

        let rows: Vec<ProductRecord> = self.send_json(request, "find record").await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, record: &NewRecord) -> Result<ProductRecord> {
        let request = self
            .client
            .post(self.endpoint(&self.records_table))
            .header("Prefer", "return=representation")
            .json(&[record]);

        let rows: Vec<ProductRecord> = self.send_json(request, "insert record").await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::store(format!("insert returned no row for {}", record.url)))
    }

    async fn update(&self, id: &RecordId, update: &RecordUpdate) -> Result<()> {
        let request = self
            .client
            .patch(self.endpoint(&self.records_table))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(update);

        // PostgREST answers 2xx even when the filter matched nothing
        let rows: Vec<ProductRecord> = self.send_json(request, "update record").await?;
        if rows.is_empty() {
            return Err(AppError::store(format!("no record with id {id}")));
        }
        Ok(())
    }

    async fn append_log(&self, entry: &ChangeLogEntry) -> Result<()> {
        let request = self
            .client
            .post(self.endpoint(&self.log_table))
            .header("Prefer", "return=minimal")
            .json(&[entry]);

        self.send(request, "append change log").await?;
        Ok(())
    }

    async fn history(&self, id: &RecordId) -> Result<Vec<ChangeLogEntry>> {
        let request = self.client.get(self.endpoint(&self.log_table)).query(&[
            ("select", "*".to_string()),
            ("game_id", format!("eq.{id}")),
            ("order", "changed_at.asc,id.asc".to_string()),
        ]);

        self.send_json(request, "read change log").await
    }
}
