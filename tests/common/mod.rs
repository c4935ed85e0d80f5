//! Shared fixtures for integration tests
//!
//! Builds a dashboard over a temporary CSV file, with provisioned
//! accounts and a store that can be told to fail its next saves.

#![allow(dead_code)]

use dbd::audit::{AuditLog, CsvAuditLog};
use dbd::record::{Dataset, RawDataset};
use dbd::storage::{CsvStore, DatasetStore, DatasetVersion, LoadedDataset, OpenStore, StorageError, StorageResult};
use dbd::{DashboardApi, DashboardConfig, StaticCredentials};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const MASTER_PASSWORD: &str = "master-secret";
pub const REGIONAL_PASSWORD: &str = "regional-secret";

pub const HEADER: &str =
    "id,kode_provinsi,nama_provinsi,kode_kabupaten_kota,nama_kabupaten_kota,jumlah_kasus,satuan,tahun";

/// Two regions of West Java over two years
pub const SAMPLE_ROWS: &[&str] = &[
    "1,32,JAWA BARAT,3201,KAB. BOGOR,100,KASUS,2021",
    "2,32,JAWA BARAT,3202,KAB. SUKABUMI,40,KASUS,2021",
    "3,32,JAWA BARAT,3201,KAB. BOGOR,150,KASUS,2022",
    "4,32,JAWA BARAT,3202,KAB. SUKABUMI,50,KASUS,2022",
];

pub fn csv_text(rows: &[&str]) -> String {
    let mut text = String::from(HEADER);
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

pub fn write_csv(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).expect("write fixture csv");
    path
}

/// Dataset store that fails `save` while `fail` is set
pub struct FlakyStore {
    inner: CsvStore,
    fail: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: CsvStore) -> Self {
        Self {
            inner,
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl DatasetStore for FlakyStore {
    fn load(&self) -> StorageResult<LoadedDataset> {
        self.inner.load()
    }

    fn load_raw(&self) -> StorageResult<RawDataset> {
        self.inner.load_raw()
    }

    fn save(&self, dataset: &Dataset, expected: Option<&DatasetVersion>) -> StorageResult<DatasetVersion> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "disk is read-only",
            )));
        }
        self.inner.save(dataset, expected)
    }

    fn current_version(&self) -> StorageResult<Option<DatasetVersion>> {
        self.inner.current_version()
    }
}

/// A dashboard over files in a temporary directory
pub struct Fixture {
    pub dir: TempDir,
    pub data_path: PathBuf,
    pub audit_path: PathBuf,
    pub store: Arc<FlakyStore>,
    pub audit: Arc<CsvAuditLog>,
    pub api: DashboardApi,
}

impl Fixture {
    pub fn new(rows: &[&str]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let data_path = write_csv(dir.path(), "data_dbd.csv", &csv_text(rows));
        let audit_path = dir.path().join("logs").join("admin_log.csv");

        let store = Arc::new(FlakyStore::new(CsvStore::open(&data_path).expect("open store")));
        let audit = Arc::new(CsvAuditLog::open(&audit_path));
        let credentials = StaticCredentials::new()
            .with_cost(4)
            .provision(MASTER_PASSWORD, REGIONAL_PASSWORD, ["3201", "3202", "3203"])
            .expect("provision credentials");
        let config = DashboardConfig {
            data_path: data_path.clone(),
            audit_path: audit_path.clone(),
            ..DashboardConfig::default()
        };

        let api = DashboardApi::new(store.clone(), audit.clone(), Arc::new(credentials), config);
        Self {
            dir,
            data_path,
            audit_path,
            store,
            audit,
            api,
        }
    }

    pub fn sample() -> Self {
        Self::new(SAMPLE_ROWS)
    }

    /// What is on disk now
    pub fn stored(&self) -> Dataset {
        CsvStore::open(&self.data_path)
            .and_then(|s| s.load())
            .expect("load stored dataset")
            .dataset
    }

    pub fn audit_entries(&self) -> Vec<dbd::AuditEntry> {
        self.audit.load_all().expect("read audit log")
    }
}
