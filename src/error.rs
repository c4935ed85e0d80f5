//! Dashboard-level error kinds
//!
//! Module errors (`StorageError`, `AuditError`, `CrudError`, `InsightError`,
//! `ConfigError`) convert into `DashboardError`, whose Display strings are
//! the messages shown to users.

use crate::audit::AuditError;
use crate::config::ConfigError;
use crate::crud::CrudError;
use crate::insight::InsightError;
use crate::storage::{DatasetVersion, StorageError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("data file not found: {0}")]
    NotFound(PathBuf),

    #[error("data file is malformed: {0}")]
    Format(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("could not save: {0}")]
    Persistence(String),

    #[error("the data was changed by someone else (loaded {expected}, now {found}); reload and try again")]
    Conflict {
        expected: DatasetVersion,
        found: DatasetVersion,
    },

    #[error("login failed: {0}")]
    Auth(String),

    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("session not found or expired")]
    SessionNotFound,

    #[error("{0}")]
    ExternalService(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type DashboardResult<T> = Result<T, DashboardError>;

impl DashboardError {
    /// Whether repeating the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::ExternalService(_))
    }
}

impl From<StorageError> for DashboardError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(path) => Self::NotFound(path),
            StorageError::Format(msg) => Self::Format(msg),
            StorageError::Record(e) => Self::Format(e.to_string()),
            StorageError::Csv(e) => Self::Format(e.to_string()),
            StorageError::Io(e) => Self::Persistence(e.to_string()),
            StorageError::Conflict { expected, found } => Self::Conflict { expected, found },
        }
    }
}

impl From<AuditError> for DashboardError {
    fn from(e: AuditError) -> Self {
        match e {
            AuditError::Format { .. } => Self::Format(e.to_string()),
            _ => Self::Persistence(e.to_string()),
        }
    }
}

impl From<CrudError> for DashboardError {
    fn from(e: CrudError) -> Self {
        match e {
            CrudError::Forbidden(msg) => Self::Forbidden(msg),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<InsightError> for DashboardError {
    fn from(e: InsightError) -> Self {
        Self::ExternalService(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordId;
    use std::io;

    #[test]
    fn storage_errors_map_to_kinds() {
        let e: DashboardError = StorageError::NotFound(PathBuf::from("x.csv")).into();
        assert!(matches!(e, DashboardError::NotFound(_)));

        let e: DashboardError = StorageError::Io(io::Error::new(io::ErrorKind::Other, "disk full")).into();
        assert!(matches!(e, DashboardError::Persistence(_)));
        assert!(e.is_retryable());

        let e: DashboardError = StorageError::Conflict {
            expected: DatasetVersion::of_bytes(b"a"),
            found: DatasetVersion::of_bytes(b"b"),
        }
        .into();
        assert!(e.to_string().contains("reload"));
    }

    #[test]
    fn crud_errors_map_to_forbidden_or_validation() {
        let e: DashboardError = CrudError::Forbidden("region 3201".into()).into();
        assert!(matches!(e, DashboardError::Forbidden(_)));

        let e: DashboardError = CrudError::UnknownRecord(RecordId::new(9)).into();
        assert!(matches!(e, DashboardError::Validation(_)));
        assert!(!e.is_retryable());
    }

    #[test]
    fn insight_errors_keep_their_message() {
        let e: DashboardError = InsightError::Quota("daily limit".into()).into();
        assert_eq!(e.to_string(), "text-generation quota exhausted: daily limit");
    }
}
