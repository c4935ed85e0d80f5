use super::entry::{parse_timestamp, AuditAction, AuditEntry};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

const HEADER: [&str; 4] = ["timestamp", "username", "action", "details"];

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit log IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit log CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed audit log line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("audit log lock poisoned")]
    Poisoned,
}

pub type AuditResult<T> = Result<T, AuditError>;

/// Append-only audit trail
pub trait AuditLog: Send + Sync {
    /// Append one entry. Duplicates are never rejected.
    fn append(&self, entry: &AuditEntry) -> AuditResult<()>;

    /// Append several entries in order
    fn append_all(&self, entries: &[AuditEntry]) -> AuditResult<()> {
        for entry in entries {
            self.append(entry)?;
        }
        Ok(())
    }

    /// Every entry in append order; empty when nothing was logged yet
    fn load_all(&self) -> AuditResult<Vec<AuditEntry>>;
}

/// Audit trail in a CSV file with header `timestamp,username,action,details`.
pub struct CsvAuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvAuditLog {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditLog for CsvAuditLog {
    fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        self.append_all(std::slice::from_ref(entry))
    }

    fn append_all(&self, entries: &[AuditEntry]) -> AuditResult<()> {
        let _guard = self.lock.lock().map_err(|_| AuditError::Poisoned)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let needs_header = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut wtr = csv::Writer::from_writer(file);
        if needs_header {
            wtr.write_record(HEADER)?;
        }
        for entry in entries {
            wtr.write_record([
                entry.formatted_timestamp().as_str(),
                entry.username.as_str(),
                entry.action.as_str(),
                entry.details.as_str(),
            ])?;
            debug!(action = %entry.action, username = %entry.username, "audit entry appended");
        }
        wtr.flush()?;
        Ok(())
    }

    fn load_all(&self) -> AuditResult<Vec<AuditEntry>> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut entries = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let line = i + 2;
            let record = result?;
            let field = |idx: usize| record.get(idx).unwrap_or("");

            let timestamp = parse_timestamp(field(0)).ok_or_else(|| AuditError::Format {
                line,
                message: format!("bad timestamp '{}'", field(0)),
            })?;
            let Some(action) = AuditAction::parse(field(2)) else {
                warn!(line, action = field(2), "skipping audit line with unknown action");
                continue;
            };
            entries.push(AuditEntry {
                timestamp,
                username: field(1).to_string(),
                action,
                details: field(3).to_string(),
            });
        }
        Ok(entries)
    }
}

/// Audit trail held in memory
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        self.entries
            .lock()
            .map_err(|_| AuditError::Poisoned)?
            .push(entry.clone());
        Ok(())
    }

    fn load_all(&self) -> AuditResult<Vec<AuditEntry>> {
        Ok(self.entries.lock().map_err(|_| AuditError::Poisoned)?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use tempfile::tempdir;

    #[test]
    fn load_all_of_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let log = CsvAuditLog::open(dir.path().join("admin_log.csv"));
        assert!(log.load_all().unwrap().is_empty());
    }

    #[test]
    fn append_creates_header_and_keeps_duplicates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("admin_log.csv");
        let log = CsvAuditLog::open(&path);
        let who = Identity::master("masteradmin");

        let entry = AuditEntry::now(&who, AuditAction::Update, "changed, with comma");
        log.append(&entry).unwrap();
        log.append(&entry).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("timestamp,username,action,details\n"));
        assert_eq!(text.matches("timestamp,").count(), 1);

        let loaded = log.load_all().unwrap();
        assert_eq!(loaded, vec![entry.clone(), entry]);
    }

    #[test]
    fn load_all_rejects_bad_timestamp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("admin_log.csv");
        fs::write(&path, "timestamp,username,action,details\nyesterday,u,LOGIN,\n").unwrap();
        let err = CsvAuditLog::open(&path).load_all().unwrap_err();
        assert!(matches!(err, AuditError::Format { line: 2, .. }));
    }

    #[test]
    fn memory_log_appends_in_order() {
        let log = MemoryAuditLog::new();
        let who = Identity::regional("admin3201", "3201");
        log.append_all(&[
            AuditEntry::now(&who, AuditAction::Login, ""),
            AuditEntry::now(&who, AuditAction::Logout, ""),
        ])
        .unwrap();
        let actions: Vec<AuditAction> = log.load_all().unwrap().iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Login, AuditAction::Logout]);
    }
}
