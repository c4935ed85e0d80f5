//! DBD Dashboard: data layer for a dengue-fever case dashboard
//!
//! Loads, validates and cleans a CSV table of case counts per region and
//! year, aggregates it for charts and narrative summaries, and lets
//! administrators edit it within their access scope with every change
//! recorded in an audit trail.
//!
//! # Core Concepts
//!
//! - **Dataset**: typed case records, loaded at a content version
//! - **Identity**: master (every region) or regional (one region code)
//! - **Change set**: updates, additions and deletions keyed by record id
//! - **Session**: one login, with its cached dataset and last narrative
//!
//! # Example
//!
//! ```
//! use dbd::{Dataset, DatasetFilter};
//!
//! let dataset = Dataset::new();
//! assert!(DatasetFilter::new().with_year(2022).apply(&dataset).is_empty());
//! ```

pub mod aggregate;
pub mod api;
pub mod audit;
pub mod auth;
pub mod chart;
pub mod config;
pub mod crud;
pub mod error;
pub mod insight;
pub mod record;
pub mod schema;
pub mod session;
pub mod storage;

pub use aggregate::{DatasetFilter, Field, SummaryStatistics};
pub use api::{DashboardApi, DatasetView, InsightReply, SaveOutcome};
pub use audit::{ActionCategory, AuditAction, AuditEntry, AuditLog, CsvAuditLog};
pub use auth::{CredentialStore, Identity, Role, StaticCredentials};
pub use chart::{ChartData, ChartRequest};
pub use config::DashboardConfig;
pub use crud::{apply_changes, ChangeSet, CrudError, RecordPatch};
pub use error::{DashboardError, DashboardResult};
pub use insight::{InsightClient, InsightError, InsightRequest};
pub use record::{CaseRecord, Dataset, RawDataset, RecordId};
pub use session::SessionId;
pub use storage::{CsvStore, DatasetStore, DatasetVersion, OpenStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
