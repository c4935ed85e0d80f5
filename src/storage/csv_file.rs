//! CSV file backend

use super::traits::{DatasetStore, DatasetVersion, LoadedDataset, OpenStore, StorageError, StorageResult};
use crate::record::{Dataset, RawDataset};
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Dataset store backed by a single CSV file.
///
/// Saves are serialized through an internal lock, go to a temporary file in
/// the same directory and are renamed over the target, so a failed save
/// leaves the previous file in place.
pub struct CsvStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvStore {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_bytes(&self) -> StorageResult<Vec<u8>> {
        fs::read(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(self.path.clone()),
            _ => StorageError::Io(e),
        })
    }

    fn read_version(&self) -> StorageResult<Option<DatasetVersion>> {
        match self.read_bytes() {
            Ok(bytes) => Ok(Some(DatasetVersion::of_bytes(&bytes))),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl OpenStore for CsvStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }
}

impl DatasetStore for CsvStore {
    fn load(&self) -> StorageResult<LoadedDataset> {
        let bytes = self.read_bytes()?;
        let version = DatasetVersion::of_bytes(&bytes);
        let raw = read_raw(bytes.as_slice())?;

        let missing = raw.missing_columns();
        if !missing.is_empty() {
            return Err(StorageError::Format(format!(
                "missing required columns: {}",
                missing.join(", ")
            )));
        }

        let dataset = Dataset::from_raw(&raw)?;
        info!(path = %self.path.display(), records = dataset.len(), %version, "loaded dataset");
        Ok(LoadedDataset { dataset, version })
    }

    fn load_raw(&self) -> StorageResult<RawDataset> {
        let bytes = self.read_bytes()?;
        read_raw(bytes.as_slice())
    }

    fn save(&self, dataset: &Dataset, expected: Option<&DatasetVersion>) -> StorageResult<DatasetVersion> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::Io(std::io::Error::new(ErrorKind::Other, "store lock poisoned")))?;

        if let Some(expected) = expected {
            let found = self
                .read_version()?
                .unwrap_or_else(|| DatasetVersion::of_bytes(&[]));
            if &found != expected {
                warn!(path = %self.path.display(), %expected, %found, "refusing save over changed file");
                return Err(StorageError::Conflict {
                    expected: expected.clone(),
                    found,
                });
            }
        }

        let mut bytes = Vec::new();
        write_dataset(dataset, &mut bytes)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;

        let version = DatasetVersion::of_bytes(&bytes);
        info!(path = %self.path.display(), records = dataset.len(), %version, "saved dataset");
        Ok(version)
    }

    fn current_version(&self) -> StorageResult<Option<DatasetVersion>> {
        self.read_version()
    }
}

/// Parse CSV text into an untyped table. Every cell is kept as text, so
/// codes with leading zeros survive; blank cells become nulls.
pub fn read_raw<R: Read>(reader: R) -> StorageResult<RawDataset> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut raw = RawDataset::new(headers);
    for result in rdr.records() {
        let record = result.map_err(|e| StorageError::Format(e.to_string()))?;
        raw.push_row(
            record
                .iter()
                .map(|cell| if cell.is_empty() { None } else { Some(cell.to_string()) })
                .collect(),
        );
    }
    debug!(rows = raw.len(), columns = raw.headers().len(), "parsed CSV");
    Ok(raw)
}

/// Write an untyped table as CSV, header first. Nulls are written as empty cells.
pub fn write_raw<W: Write>(raw: &RawDataset, writer: W) -> StorageResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(raw.headers())?;
    for row in raw.rows() {
        wtr.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write a typed dataset with the persisted column set.
pub fn write_dataset<W: Write>(dataset: &Dataset, writer: W) -> StorageResult<()> {
    write_raw(&dataset.to_raw(), writer)
}
