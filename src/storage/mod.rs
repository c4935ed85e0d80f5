//! Storage backends for the case dataset
//!
//! Every backend implements the `DatasetStore` trait. The dashboard ships
//! `CsvStore`, which keeps the whole dataset in one CSV file and rewrites it
//! wholesale on each save.

mod csv_file;
mod traits;

pub use csv_file::{read_raw, write_dataset, write_raw, CsvStore};
pub use traits::{DatasetStore, DatasetVersion, LoadedDataset, OpenStore, StorageError, StorageResult};
