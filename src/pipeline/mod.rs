//! Monitoring pipeline.
//!
//! - `detect_changes`: field-level diff of record vs. observation
//! - `Reconciler`: per-URL state transition
//! - `run_monitor`: one full pass over the sitemap

pub mod detect;
pub mod reconcile;
pub mod run;

#[cfg(test)]
pub(crate) mod testing;

pub use detect::detect_changes;
pub use reconcile::{ReconcileOutcome, Reconciler, SkipReason};
pub use run::{Monitor, RunSummary, run_monitor};
