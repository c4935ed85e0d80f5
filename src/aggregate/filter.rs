//! Record filters for narrowing a dataset before aggregation

use crate::record::{CaseRecord, Dataset};

/// Filter by year range, provinces and regions. Empty criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct DatasetFilter {
    /// Inclusive year bounds
    pub years: Option<(i32, i32)>,
    /// Province names
    pub provinces: Vec<String>,
    /// Region codes
    pub regions: Vec<String>,
}

impl DatasetFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_years(mut self, from: i32, to: i32) -> Self {
        self.years = Some((from.min(to), from.max(to)));
        self
    }

    pub fn with_year(self, year: i32) -> Self {
        self.with_years(year, year)
    }

    pub fn with_province(mut self, province: impl Into<String>) -> Self {
        self.provinces.push(province.into());
        self
    }

    pub fn with_region(mut self, region_code: impl Into<String>) -> Self {
        self.regions.push(region_code.into());
        self
    }

    pub fn matches(&self, record: &CaseRecord) -> bool {
        if let Some((from, to)) = self.years {
            if record.year < from || record.year > to {
                return false;
            }
        }
        if !self.provinces.is_empty() && !self.provinces.iter().any(|p| *p == record.province_name) {
            return false;
        }
        if !self.regions.is_empty() && !self.regions.iter().any(|r| *r == record.region_code) {
            return false;
        }
        true
    }

    /// Matching records, in dataset order
    pub fn apply(&self, dataset: &Dataset) -> Dataset {
        dataset.filter(|r| self.matches(r))
    }
}
