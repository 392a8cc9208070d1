// src/models/product.rs

//! Point-in-time product observation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{FieldKind, FieldValue, TrackedField};

/// One of the two selectable product configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Primary,
    Secondary,
}

impl Variant {
    /// Both variants in display order.
    pub const ALL: [Variant; 2] = [Variant::Primary, Variant::Secondary];

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Primary => "primary",
            Variant::Secondary => "secondary",
        }
    }

    /// The price and stock fields belonging to this variant.
    pub fn fields(self) -> [TrackedField; 2] {
        match self {
            Variant::Primary => [TrackedField::PrimaryPrice, TrackedField::PrimaryStock],
            Variant::Secondary => [TrackedField::SecondaryPrice, TrackedField::SecondaryStock],
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price and stock of a single variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantState {
    /// Display price exactly as shown on the page (e.g. "R$ 49,90")
    pub price: String,

    /// Whether the variant can currently be bought
    pub stock: bool,
}

impl VariantState {
    pub fn new(price: impl Into<String>, stock: bool) -> Self {
        Self {
            price: price.into(),
            stock,
        }
    }

    /// Read the field of the given kind.
    pub fn value(&self, kind: FieldKind) -> FieldValue {
        match kind {
            FieldKind::Price => FieldValue::Price(self.price.clone()),
            FieldKind::Stock => FieldValue::Stock(self.stock),
        }
    }
}

/// A single scrape result for a product URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub url: String,
    pub primary: VariantState,
    pub secondary: VariantState,
}

impl Observation {
    pub fn new(url: impl Into<String>, primary: VariantState, secondary: VariantState) -> Self {
        Self {
            url: url.into(),
            primary,
            secondary,
        }
    }

    pub fn variant(&self, variant: Variant) -> &VariantState {
        match variant {
            Variant::Primary => &self.primary,
            Variant::Secondary => &self.secondary,
        }
    }

    /// Read a tracked field from this observation.
    pub fn value(&self, field: TrackedField) -> FieldValue {
        self.variant(field.variant()).value(field.kind())
    }
}
