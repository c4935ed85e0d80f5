//! Storage trait definitions

use crate::record::{Dataset, RawDataset, RecordError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("data file not found: {0}")]
    NotFound(PathBuf),

    #[error("malformed data file: {0}")]
    Format(String),

    #[error("invalid record: {0}")]
    Record(#[from] RecordError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data file changed since it was loaded (expected {expected}, found {found})")]
    Conflict {
        expected: DatasetVersion,
        found: DatasetVersion,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Content digest of the data file as it was read.
///
/// Two loads of an unchanged file yield equal versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetVersion(String);

impl DatasetVersion {
    /// Hex SHA-256 of the given bytes
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DatasetVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form is enough to tell versions apart in messages
        write!(f, "{}", &self.0[..self.0.len().min(12)])
    }
}

/// A typed dataset together with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub version: DatasetVersion,
}

/// Trait for dataset storage backends
///
/// Implementations must be thread-safe (Send + Sync); the dashboard shares
/// one store between every session.
pub trait DatasetStore: Send + Sync {
    /// Load and type the whole dataset
    fn load(&self) -> StorageResult<LoadedDataset>;

    /// Load the untyped table, for validation and cleaning
    fn load_raw(&self) -> StorageResult<RawDataset>;

    /// Replace the stored dataset.
    ///
    /// When `expected` is given and the stored data no longer matches it,
    /// nothing is written and `StorageError::Conflict` is returned.
    fn save(&self, dataset: &Dataset, expected: Option<&DatasetVersion>) -> StorageResult<DatasetVersion>;

    /// Version of what is stored now, `None` when nothing is stored
    fn current_version(&self) -> StorageResult<Option<DatasetVersion>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: DatasetStore + Sized {
    /// Bind a store to the given path. The file need not exist yet.
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_stable_for_equal_bytes() {
        let a = DatasetVersion::of_bytes(b"tahun\n2022\n");
        let b = DatasetVersion::of_bytes(b"tahun\n2022\n");
        let c = DatasetVersion::of_bytes(b"tahun\n2023\n");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(a.to_string().len(), 12);
    }
}
