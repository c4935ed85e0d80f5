//! Case records and the tabular forms they travel in

mod case;
mod coerce;
mod raw;

pub use case::{CaseRecord, Dataset, RecordError, RecordId, RegionProfile, MAX_RECORD_ID};
pub use coerce::{canonical_number, parse_code, parse_number, parse_year};
pub use raw::{RawDataset, RawRow};

/// Column names of the dataset file.
///
/// The Indonesian names are the on-disk contract shared with the
/// existing dashboard files and must not be translated.
pub mod columns {
    pub const ID: &str = "id";
    pub const PROVINCE_CODE: &str = "kode_provinsi";
    pub const PROVINCE_NAME: &str = "nama_provinsi";
    pub const REGION_CODE: &str = "kode_kabupaten_kota";
    pub const REGION_NAME: &str = "nama_kabupaten_kota";
    pub const CASE_COUNT: &str = "jumlah_kasus";
    pub const UNIT: &str = "satuan";
    pub const YEAR: &str = "tahun";

    /// Columns every dataset must carry.
    pub const REQUIRED: [&str; 7] = [
        PROVINCE_CODE,
        PROVINCE_NAME,
        REGION_CODE,
        REGION_NAME,
        CASE_COUNT,
        UNIT,
        YEAR,
    ];

    /// Columns written on save, in order.
    pub const PERSISTED: [&str; 8] = [
        ID,
        PROVINCE_CODE,
        PROVINCE_NAME,
        REGION_CODE,
        REGION_NAME,
        CASE_COUNT,
        UNIT,
        YEAR,
    ];

    /// Columns a regional identity may not change.
    pub const PROTECTED: [&str; 5] = [PROVINCE_CODE, PROVINCE_NAME, REGION_CODE, REGION_NAME, UNIT];
}

/// Plausible reporting years.
pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;
