//! Append-only audit trail of logins and data changes
//!
//! Entries are only ever appended. The read side splits them into
//! authentication and data-change views, newest first.

mod entry;
mod store;

pub use entry::{
    filter_by_category, parse_timestamp, ActionCategory, AuditAction, AuditEntry, TIMESTAMP_FORMAT,
};
pub use store::{AuditError, AuditLog, AuditResult, CsvAuditLog, MemoryAuditLog};
