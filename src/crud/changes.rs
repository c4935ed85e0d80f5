use super::CrudError;
use crate::record::{columns, parse_code, parse_number, parse_year, RecordId};
use serde::{Deserialize, Serialize};

/// Field values to set on a record. `None` leaves a field unchanged (for
/// updates) or asks for a backfilled value (for regional additions).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordPatch {
    pub province_code: Option<String>,
    pub province_name: Option<String>,
    pub region_code: Option<String>,
    pub region_name: Option<String>,
    pub case_count: Option<f64>,
    pub unit: Option<String>,
    pub year: Option<i32>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_case_count(mut self, case_count: f64) -> Self {
        self.case_count = Some(case_count);
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_region(mut self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.region_code = Some(code.into());
        self.region_name = Some(name.into());
        self
    }

    pub fn with_province(mut self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.province_code = Some(code.into());
        self.province_name = Some(name.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set one field from its column name and cell text, as typed in an editor.
    pub fn set(mut self, column: &str, value: &str) -> Result<Self, CrudError> {
        let value = value.trim();
        let invalid = || CrudError::Invalid(format!("invalid value '{}' for {}", value, column));
        match column {
            columns::PROVINCE_CODE => self.province_code = Some(parse_code(value).ok_or_else(invalid)?),
            columns::PROVINCE_NAME => self.province_name = Some(value.to_string()),
            columns::REGION_CODE => self.region_code = Some(value.to_string()),
            columns::REGION_NAME => self.region_name = Some(value.to_string()),
            columns::CASE_COUNT => self.case_count = Some(parse_number(value).ok_or_else(invalid)?),
            columns::UNIT => self.unit = Some(value.to_string()),
            columns::YEAR => self.year = Some(parse_year(value).ok_or_else(invalid)?),
            other => return Err(CrudError::Invalid(format!("unknown or read-only column: {}", other))),
        }
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Edits submitted in one save: rows are addressed by id, never by position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeSet {
    pub updates: Vec<(RecordId, RecordPatch)>,
    pub additions: Vec<RecordPatch>,
    pub deletions: Vec<RecordId>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(mut self, id: RecordId, patch: RecordPatch) -> Self {
        self.updates.push((id, patch));
        self
    }

    pub fn add(mut self, patch: RecordPatch) -> Self {
        self.additions.push(patch);
        self
    }

    pub fn delete(mut self, id: RecordId) -> Self {
        self.deletions.push(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.additions.is_empty() && self.deletions.is_empty()
    }

    /// Number of submitted edits
    pub fn len(&self) -> usize {
        self.updates.len() + self.additions.len() + self.deletions.len()
    }
}
