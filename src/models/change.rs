// src/models/change.rs

//! Tracked fields and the field-level changes produced by the detector.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Variant;

/// Whether a tracked field holds a price or a stock flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Price,
    Stock,
}

/// The four comparable product fields.
///
/// Declaration order is the order in which changes are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    PrimaryPrice,
    PrimaryStock,
    SecondaryPrice,
    SecondaryStock,
}

impl TrackedField {
    /// All fields in reporting order.
    pub const ALL: [TrackedField; 4] = [
        TrackedField::PrimaryPrice,
        TrackedField::PrimaryStock,
        TrackedField::SecondaryPrice,
        TrackedField::SecondaryStock,
    ];

    /// Column name used by the record store and change log.
    pub fn as_str(self) -> &'static str {
        match self {
            TrackedField::PrimaryPrice => "primary_price",
            TrackedField::PrimaryStock => "primary_stock",
            TrackedField::SecondaryPrice => "secondary_price",
            TrackedField::SecondaryStock => "secondary_stock",
        }
    }

    pub fn variant(self) -> Variant {
        match self {
            TrackedField::PrimaryPrice | TrackedField::PrimaryStock => Variant::Primary,
            TrackedField::SecondaryPrice | TrackedField::SecondaryStock => Variant::Secondary,
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            TrackedField::PrimaryPrice | TrackedField::SecondaryPrice => FieldKind::Price,
            TrackedField::PrimaryStock | TrackedField::SecondaryStock => FieldKind::Stock,
        }
    }
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed value of a tracked field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Price(String),
    Stock(bool),
}

impl fmt::Display for FieldValue {
    /// Change-log form: prices verbatim, stock as `"true"`/`"false"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Price(price) => f.write_str(price),
            FieldValue::Stock(stock) => write!(f, "{stock}"),
        }
    }
}

/// A single differing field between a stored record and a new observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub field: TrackedField,
    pub old_value: FieldValue,
    pub new_value: FieldValue,
}

impl Change {
    /// Find the change for `field` in a detector result.
    pub fn find(changes: &[Change], field: TrackedField) -> Option<&Change> {
        changes.iter().find(|c| c.field == field)
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} → {}", self.field, self.old_value, self.new_value)
    }
}
