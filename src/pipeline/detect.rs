//! Field-level change detection.
//!
//! Compares a stored record with a fresh observation. Values are compared
//! exactly as scraped: a formatting-only difference in a price string is a
//! change.

use crate::models::{Change, Observation, ProductRecord, TrackedField};

/// Changes between `record` and `observation`, in `TrackedField::ALL` order.
///
/// An empty result means nothing needs to be written.
pub fn detect_changes(record: &ProductRecord, observation: &Observation) -> Vec<Change> {
    TrackedField::ALL
        .into_iter()
        .filter_map(|field| {
            let old_value = record.fields.value(field);
            let new_value = observation.value(field);
            (old_value != new_value).then_some(Change {
                field,
                old_value,
                new_value,
            })
        })
        .collect()
}
