//! Typed case records and the dataset collection

use super::coerce::{canonical_number, parse_code, parse_number, parse_year};
use super::columns;
use super::raw::RawDataset;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Largest id accepted from a dataset file
pub const MAX_RECORD_ID: u64 = u32::MAX as u64;

/// Stable identifier of a case record.
///
/// Stored in the optional `id` column; rows without one are numbered after
/// the highest existing id when the dataset is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// One row of reported case data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: RecordId,
    pub province_code: String,
    pub province_name: String,
    /// Fixed-width administrative code; compared as text so leading zeros survive
    pub region_code: String,
    pub region_name: String,
    pub case_count: f64,
    pub unit: String,
    pub year: i32,
}

impl CaseRecord {
    /// Cells in `columns::PERSISTED` order, as written to disk
    pub fn to_cells(&self) -> [String; 8] {
        [
            self.id.to_string(),
            self.province_code.clone(),
            self.province_name.clone(),
            self.region_code.clone(),
            self.region_name.clone(),
            canonical_number(self.case_count),
            self.unit.clone(),
            self.year.to_string(),
        ]
    }

    /// Short human description used in audit details
    pub fn describe(&self) -> String {
        format!(
            "id: {}, region: {} {}, year: {}",
            self.id, self.region_code, self.region_name, self.year
        )
    }
}

/// Identity columns shared by every record of one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionProfile {
    pub region_code: String,
    pub region_name: String,
    pub province_code: String,
    pub province_name: String,
    pub unit: String,
}

/// A raw row that could not be turned into a `CaseRecord`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("row {row}: column {column} is empty")]
    Null { row: usize, column: String },

    #[error("row {row}: column {column} has invalid value '{value}'")]
    Invalid {
        row: usize,
        column: String,
        value: String,
    },
}

/// Ordered collection of case records; the single source of truth once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    records: Vec<CaseRecord>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<CaseRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CaseRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CaseRecord> {
        self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CaseRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: CaseRecord) {
        self.records.push(record);
    }

    pub fn get(&self, id: RecordId) -> Option<&CaseRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Records of one region, in dataset order
    pub fn region(&self, region_code: &str) -> Dataset {
        self.filter(|r| r.region_code == region_code)
    }

    /// Records matching a predicate, in dataset order
    pub fn filter(&self, pred: impl Fn(&CaseRecord) -> bool) -> Dataset {
        Dataset::from_records(self.records.iter().filter(|r| pred(r)).cloned().collect())
    }

    /// Profile of a region taken from its first record
    pub fn region_profile(&self, region_code: &str) -> Option<RegionProfile> {
        self.records
            .iter()
            .find(|r| r.region_code == region_code)
            .map(|r| RegionProfile {
                region_code: r.region_code.clone(),
                region_name: r.region_name.clone(),
                province_code: r.province_code.clone(),
                province_name: r.province_name.clone(),
                unit: r.unit.clone(),
            })
    }

    /// Next unused record id, `None` once ids are exhausted
    pub fn next_id(&self) -> Option<RecordId> {
        match self.records.iter().map(|r| r.id.value()).max() {
            Some(max) => max.checked_add(1).map(RecordId),
            None => Some(RecordId(1)),
        }
    }

    /// Type every row of a raw table.
    ///
    /// Fails on the first row with a null or non-coercible required cell.
    /// Rows without an `id`, and rows repeating an id seen earlier in the
    /// file, are numbered after the highest id present.
    pub fn from_raw(raw: &RawDataset) -> Result<Self, RecordError> {
        if let Some(missing) = raw.missing_columns().first() {
            return Err(RecordError::MissingColumn(missing.to_string()));
        }

        let mut records = Vec::with_capacity(raw.len());
        let mut pending_ids = Vec::new();
        let mut seen = HashSet::new();

        for row in 0..raw.len() {
            let text = |column: &str| -> Result<String, RecordError> {
                raw.cell(row, column)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| RecordError::Null {
                        row: row + 1,
                        column: column.to_string(),
                    })
            };
            let invalid = |column: &str, value: &str| RecordError::Invalid {
                row: row + 1,
                column: column.to_string(),
                value: value.to_string(),
            };

            let province_code_raw = text(columns::PROVINCE_CODE)?;
            let province_code = parse_code(&province_code_raw)
                .ok_or_else(|| invalid(columns::PROVINCE_CODE, &province_code_raw))?;
            let case_raw = text(columns::CASE_COUNT)?;
            let case_count =
                parse_number(&case_raw).ok_or_else(|| invalid(columns::CASE_COUNT, &case_raw))?;
            let year_raw = text(columns::YEAR)?;
            let year = parse_year(&year_raw).ok_or_else(|| invalid(columns::YEAR, &year_raw))?;

            let id = match raw.cell(row, columns::ID).map(str::trim).filter(|s| !s.is_empty()) {
                Some(value) => {
                    let parsed = parse_number(value)
                        .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= MAX_RECORD_ID as f64)
                        .ok_or_else(|| invalid(columns::ID, value))?;
                    Some(RecordId(parsed as u64))
                }
                None => None,
            };
            let id = id.filter(|id| seen.insert(*id));
            if id.is_none() {
                pending_ids.push(records.len());
            }

            records.push(CaseRecord {
                id: id.unwrap_or(RecordId(0)),
                province_code,
                province_name: text(columns::PROVINCE_NAME)?,
                region_code: text(columns::REGION_CODE)?,
                region_name: text(columns::REGION_NAME)?,
                case_count,
                unit: text(columns::UNIT)?,
                year,
            });
        }

        let mut next = seen.iter().map(|id| id.value()).max().map_or(1, |m| m + 1);
        for idx in pending_ids {
            records[idx].id = RecordId(next);
            next = next.checked_add(1).ok_or_else(|| RecordError::Invalid {
                row: idx + 1,
                column: columns::ID.to_string(),
                value: next.to_string(),
            })?;
        }

        Ok(Self { records })
    }

    /// Render as a raw table with the persisted column set
    pub fn to_raw(&self) -> RawDataset {
        let headers = columns::PERSISTED.iter().map(|c| c.to_string()).collect();
        let rows = self
            .records
            .iter()
            .map(|r| r.to_cells().into_iter().map(Some).collect())
            .collect();
        RawDataset::with_rows(headers, rows)
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a CaseRecord;
    type IntoIter = std::slice::Iter<'a, CaseRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<CaseRecord> for Dataset {
    fn from_iter<T: IntoIterator<Item = CaseRecord>>(iter: T) -> Self {
        Self::from_records(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADERS: [&str; 8] = columns::PERSISTED;

    #[test]
    fn from_raw_keeps_region_code_as_text() {
        let raw = RawDataset::from_strs(
            &HEADERS,
            &[&["1", "32", "JAWA BARAT", "0301", "KAB. X", "10", "KASUS", "2022"]],
        );
        let ds = Dataset::from_raw(&raw).unwrap();
        assert_eq!(ds.records()[0].region_code, "0301");
    }

    #[test]
    fn from_raw_assigns_missing_ids_after_max() {
        let raw = RawDataset::from_strs(
            &HEADERS,
            &[
                &["", "32", "JAWA BARAT", "3201", "KAB. BOGOR", "10", "KASUS", "2022"],
                &["7", "32", "JAWA BARAT", "3202", "KAB. SUKABUMI", "5", "KASUS", "2022"],
                &["", "32", "JAWA BARAT", "3203", "KAB. CIANJUR", "3", "KASUS", "2022"],
            ],
        );
        let ds = Dataset::from_raw(&raw).unwrap();
        let ids: Vec<u64> = ds.iter().map(|r| r.id.value()).collect();
        assert_eq!(ids, vec![8, 7, 9]);
    }

    #[test]
    fn from_raw_works_without_id_column() {
        let raw = RawDataset::from_strs(
            &columns::REQUIRED,
            &[&["32", "JAWA BARAT", "3201", "KAB. BOGOR", "10.0", "KASUS", "2022.0"]],
        );
        let ds = Dataset::from_raw(&raw).unwrap();
        assert_eq!(ds.records()[0].id, RecordId::new(1));
        assert_eq!(ds.records()[0].year, 2022);
        assert_eq!(ds.records()[0].case_count, 10.0);
    }

    #[test]
    fn from_raw_reports_row_and_column() {
        let raw = RawDataset::from_strs(
            &HEADERS,
            &[&["1", "32", "JAWA BARAT", "3201", "KAB. BOGOR", "many", "KASUS", "2022"]],
        );
        let err = Dataset::from_raw(&raw).unwrap_err();
        assert_eq!(
            err,
            RecordError::Invalid {
                row: 1,
                column: "jumlah_kasus".into(),
                value: "many".into()
            }
        );
    }

    #[test]
    fn region_profile_uses_first_record() {
        let raw = RawDataset::from_strs(
            &HEADERS,
            &[
                &["1", "32", "JAWA BARAT", "3201", "KAB. BOGOR", "10", "KASUS", "2022"],
                &["2", "32", "JAWA BARAT", "3201", "KAB. BOGOR", "12", "KASUS", "2023"],
            ],
        );
        let ds = Dataset::from_raw(&raw).unwrap();
        let profile = ds.region_profile("3201").unwrap();
        assert_eq!(profile.region_name, "KAB. BOGOR");
        assert!(ds.region_profile("3299").is_none());
        assert_eq!(ds.next_id(), Some(RecordId::new(3)));
    }

    #[test]
    fn repeated_ids_are_renumbered() {
        let raw = RawDataset::from_strs(
            &HEADERS,
            &[
                &["1", "32", "JAWA BARAT", "3201", "KAB. BOGOR", "10", "KASUS", "2022"],
                &["1", "32", "JAWA BARAT", "3202", "KAB. SUKABUMI", "5", "KASUS", "2022"],
                &["", "32", "JAWA BARAT", "3203", "KAB. CIANJUR", "3", "KASUS", "2022"],
            ],
        );
        let ds = Dataset::from_raw(&raw).unwrap();
        let ids: Vec<(u64, &str)> = ds.iter().map(|r| (r.id.value(), r.region_code.as_str())).collect();
        assert_eq!(ids, vec![(1, "3201"), (2, "3202"), (3, "3203")]);
    }

    #[test]
    fn oversized_ids_are_invalid() {
        for value in ["18446744073709551615", "1e30", "4294967296"] {
            let raw = RawDataset::from_strs(
                &HEADERS,
                &[&[value, "32", "JAWA BARAT", "3201", "KAB. BOGOR", "10", "KASUS", "2022"]],
            );
            assert!(
                matches!(Dataset::from_raw(&raw), Err(RecordError::Invalid { ref column, .. }) if column == "id"),
                "{value} accepted"
            );
        }

        let top = Dataset::from_records(vec![CaseRecord {
            id: RecordId::new(u64::MAX),
            province_code: "32".into(),
            province_name: "JAWA BARAT".into(),
            region_code: "3201".into(),
            region_name: "KAB. BOGOR".into(),
            case_count: 1.0,
            unit: "KASUS".into(),
            year: 2022,
        }]);
        assert_eq!(top.next_id(), None);
    }

    #[test]
    fn to_raw_then_from_raw_is_stable() {
        let raw = RawDataset::from_strs(
            &HEADERS,
            &[&["4", "32", "JAWA BARAT", "3201", "KAB. BOGOR", "10.5", "KASUS", "2022"]],
        );
        let ds = Dataset::from_raw(&raw).unwrap();
        assert_eq!(Dataset::from_raw(&ds.to_raw()).unwrap(), ds);
    }
}
