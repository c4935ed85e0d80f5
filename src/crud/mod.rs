//! Access-scoped create/update/delete over the case dataset
//!
//! `apply_changes` is pure: it turns a base dataset and a `ChangeSet` into
//! the dataset to persist plus the audit entries describing it. Persisting
//! and appending the entries is the caller's job (see `DashboardApi::save_changes`).

mod apply;
mod changes;

pub use apply::{apply_changes, ChangeOutcome};
pub use changes::{ChangeSet, RecordPatch};

use crate::record::RecordId;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CrudError {
    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("record not found: {0}")]
    UnknownRecord(RecordId),

    #[error("invalid row: {0}")]
    Invalid(String),

    #[error("region {region_code} already has a row for year {year}")]
    Duplicate { region_code: String, year: i32 },
}
