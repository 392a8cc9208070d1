// src/models/mod.rs

//! Domain models for the monitor.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod change;
mod config;
mod product;
mod record;

// Re-export all public types
pub use change::{Change, FieldKind, FieldValue, TrackedField};
pub use config::{
    AlertLabels, Config, FeedConfig, HttpConfig, NotifierConfig, ObserverConfig, StorageBackend,
    StorageConfig, env,
};
pub use product::{Observation, Variant, VariantState};
pub use record::{ChangeLogEntry, NewRecord, ProductRecord, RecordFields, RecordId, RecordUpdate};
