// src/models/record.rs

//! Persisted product records and change-log rows.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{Change, FieldValue, Observation, TrackedField};

/// Opaque, store-assigned record identifier.
///
/// Backends may hand out numeric or textual keys; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => RecordId(s),
            Raw::Int(n) => RecordId(n.to_string()),
        })
    }
}

/// The four comparable columns of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    pub primary_price: String,
    pub primary_stock: bool,
    pub secondary_price: String,
    pub secondary_stock: bool,
}

impl RecordFields {
    /// Read a tracked field.
    pub fn value(&self, field: TrackedField) -> FieldValue {
        match field {
            TrackedField::PrimaryPrice => FieldValue::Price(self.primary_price.clone()),
            TrackedField::PrimaryStock => FieldValue::Stock(self.primary_stock),
            TrackedField::SecondaryPrice => FieldValue::Price(self.secondary_price.clone()),
            TrackedField::SecondaryStock => FieldValue::Stock(self.secondary_stock),
        }
    }
}

impl From<&Observation> for RecordFields {
    fn from(obs: &Observation) -> Self {
        Self {
            primary_price: obs.primary.price.clone(),
            primary_stock: obs.primary.stock,
            secondary_price: obs.secondary.price.clone(),
            secondary_stock: obs.secondary.stock,
        }
    }
}

/// Last-known state of a product URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: RecordId,
    pub url: String,
    #[serde(flatten)]
    pub fields: RecordFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a record that has not been seen before.
#[derive(Debug, Clone, Serialize)]
pub struct NewRecord {
    pub url: String,
    #[serde(flatten)]
    pub fields: RecordFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewRecord {
    /// Build a first-sight record; both timestamps are `now`.
    pub fn from_observation(obs: &Observation, now: DateTime<Utc>) -> Self {
        Self {
            url: obs.url.clone(),
            fields: RecordFields::from(obs),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Update payload: new field values plus the modification time.
#[derive(Debug, Clone, Serialize)]
pub struct RecordUpdate {
    #[serde(flatten)]
    pub fields: RecordFields,
    pub updated_at: DateTime<Utc>,
}

/// Immutable audit row for one detected field change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub game_id: RecordId,
    pub changed_field: TrackedField,
    pub old_value: String,
    pub new_value: String,
    pub changed_at: DateTime<Utc>,
}

impl ChangeLogEntry {
    pub fn from_change(record_id: &RecordId, change: &Change, changed_at: DateTime<Utc>) -> Self {
        Self {
            game_id: record_id.clone(),
            changed_field: change.field,
            old_value: change.old_value.to_string(),
            new_value: change.new_value.to_string(),
            changed_at,
        }
    }
}
