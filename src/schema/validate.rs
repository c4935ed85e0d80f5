use crate::record::{columns, parse_code, parse_number, parse_year, Dataset, RawDataset, MAX_YEAR, MIN_YEAR};
use crate::storage::{DatasetStore, DatasetVersion, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

use super::clean::clean;

/// Outcome of one validator: a verdict plus human-readable messages.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub messages: Vec<String>,
}

impl ValidationReport {
    fn pass() -> Self {
        Self {
            ok: true,
            messages: Vec::new(),
        }
    }

    fn from_errors(messages: Vec<String>) -> Self {
        Self {
            ok: messages.is_empty(),
            messages,
        }
    }

    fn warnings(messages: Vec<String>) -> Self {
        Self { ok: true, messages }
    }
}

/// Check required columns, emptiness and exact-duplicate rows.
pub fn validate_structure(raw: &RawDataset) -> ValidationReport {
    let missing = raw.missing_columns();
    if !missing.is_empty() {
        return ValidationReport::from_errors(vec![format!(
            "missing required columns: {}",
            missing.join(", ")
        )]);
    }

    if raw.is_empty() {
        return ValidationReport::from_errors(vec!["dataset is empty".to_string()]);
    }

    let duplicates = count_duplicate_rows(raw);
    if duplicates > 0 {
        return ValidationReport::from_errors(vec![format!(
            "found {} duplicate rows",
            duplicates
        )]);
    }

    ValidationReport::pass()
}

/// Rows that exactly repeat an earlier row
pub(crate) fn count_duplicate_rows(raw: &RawDataset) -> usize {
    let mut seen = HashSet::new();
    raw.rows().iter().filter(|row| !seen.insert(*row)).count()
}

/// Check numeric coercion, nulls in required columns and the year range.
pub fn validate_types(raw: &RawDataset) -> ValidationReport {
    let mut errors = Vec::new();

    let numeric: [(&str, fn(&str) -> bool); 3] = [
        (columns::CASE_COUNT, |v| parse_number(v).is_some()),
        (columns::YEAR, |v| parse_year(v).is_some()),
        (columns::PROVINCE_CODE, |v| parse_code(v).is_some()),
    ];
    for (column, coerces) in numeric {
        if !raw.has_column(column) {
            continue;
        }
        let bad = raw
            .column(column)
            .into_iter()
            .flatten()
            .filter(|v| !v.trim().is_empty() && !coerces(v))
            .count();
        if bad > 0 {
            errors.push(format!("column '{}': {} values are not numeric", column, bad));
        }
    }

    for column in columns::REQUIRED {
        if !raw.has_column(column) {
            continue;
        }
        let nulls = raw
            .column(column)
            .into_iter()
            .filter(|v| v.map_or(true, |s| s.trim().is_empty()))
            .count();
        if nulls > 0 {
            errors.push(format!("column '{}' has {} empty values", column, nulls));
        }
    }

    let out_of_range = raw
        .column(columns::YEAR)
        .into_iter()
        .flatten()
        .filter_map(parse_year)
        .filter(|y| !(MIN_YEAR..=MAX_YEAR).contains(y))
        .count();
    if out_of_range > 0 {
        errors.push(format!(
            "column '{}': {} values outside {}-{}",
            columns::YEAR,
            out_of_range,
            MIN_YEAR,
            MAX_YEAR
        ));
    }

    ValidationReport::from_errors(errors)
}

/// Non-fatal checks: negative counts, outliers above twice the 99th
/// percentile, and inconsistent units.
pub fn validate_business_rules(raw: &RawDataset) -> ValidationReport {
    let mut warnings = Vec::new();

    let counts: Vec<f64> = raw
        .column(columns::CASE_COUNT)
        .into_iter()
        .flatten()
        .filter_map(parse_number)
        .collect();

    let negative = counts.iter().filter(|v| **v < 0.0).count();
    if negative > 0 {
        warnings.push(format!("{} rows have a negative case count", negative));
    }

    if let Some(p99) = percentile(&counts, 0.99) {
        let threshold = 2.0 * p99;
        let outliers = counts.iter().filter(|v| **v > threshold).count();
        if outliers > 0 {
            warnings.push(format!(
                "{} potential outliers (case count > {})",
                outliers, threshold
            ));
        }
    }

    let units: BTreeSet<&str> = raw
        .column(columns::UNIT)
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if units.len() > 1 {
        let listed: Vec<&str> = units.into_iter().collect();
        warnings.push(format!("inconsistent units: {}", listed.join(", ")));
    }

    for message in &warnings {
        warn!(%message, "business rule warning");
    }
    ValidationReport::warnings(warnings)
}

/// Quantile with linear interpolation between closest ranks.
///
/// `None` for an empty sample.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Result of a quick load: either the cleaned typed dataset with any
/// business-rule warnings, or the raw table with everything that failed.
#[derive(Debug, Clone)]
pub enum Validated {
    Clean {
        dataset: Dataset,
        version: Option<DatasetVersion>,
        warnings: Vec<String>,
    },
    Invalid {
        raw: RawDataset,
        errors: Vec<String>,
    },
}

impl Validated {
    pub fn is_clean(&self) -> bool {
        matches!(self, Validated::Clean { .. })
    }

    /// All messages, errors or warnings
    pub fn messages(&self) -> &[String] {
        match self {
            Validated::Clean { warnings, .. } => warnings,
            Validated::Invalid { errors, .. } => errors,
        }
    }
}

/// Load the raw table, run every validator and clean it when structure
/// and types pass.
pub fn load_and_validate(store: &dyn DatasetStore) -> StorageResult<Validated> {
    let raw = store.load_raw()?;
    let version = store.current_version()?;

    let structure = validate_structure(&raw);
    let types = validate_types(&raw);
    let business = validate_business_rules(&raw);

    if !structure.ok || !types.ok {
        let errors: Vec<String> = structure
            .messages
            .into_iter()
            .chain(types.messages)
            .collect();
        debug!(count = errors.len(), "dataset failed validation");
        return Ok(Validated::Invalid { raw, errors });
    }

    let cleaned = clean(&raw);
    match Dataset::from_raw(&cleaned) {
        Ok(dataset) => Ok(Validated::Clean {
            dataset,
            version,
            warnings: business.messages,
        }),
        Err(e) => Ok(Validated::Invalid {
            raw,
            errors: vec![e.to_string()],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawDataset {
        RawDataset::from_strs(
            &columns::REQUIRED,
            &[
                &["32", "JAWA BARAT", "3201", "KAB. BOGOR", "100", "KASUS", "2021"],
                &["32", "JAWA BARAT", "3201", "KAB. BOGOR", "150", "KASUS", "2022"],
                &["32", "JAWA BARAT", "3202", "KAB. SUKABUMI", "40", "KASUS", "2022"],
            ],
        )
    }

    #[test]
    fn structure_names_missing_column() {
        let raw = RawDataset::from_strs(
            &["kode_provinsi", "nama_provinsi", "kode_kabupaten_kota", "nama_kabupaten_kota", "satuan", "tahun"],
            &[&["32", "JAWA BARAT", "3201", "KAB. BOGOR", "KASUS", "2022"]],
        );
        let report = validate_structure(&raw);
        assert!(!report.ok);
        assert!(report.messages[0].contains("jumlah_kasus"));
    }

    #[test]
    fn structure_rejects_empty_dataset() {
        let raw = RawDataset::from_strs(&columns::REQUIRED, &[]);
        let report = validate_structure(&raw);
        assert!(!report.ok);
        assert_eq!(report.messages, vec!["dataset is empty".to_string()]);
    }

    #[test]
    fn structure_reports_duplicate_count() {
        let row: &[&str] = &["32", "JAWA BARAT", "3201", "KAB. BOGOR", "100", "KASUS", "2021"];
        let raw = RawDataset::from_strs(&columns::REQUIRED, &[row, row, row]);
        let report = validate_structure(&raw);
        assert!(!report.ok);
        assert!(report.messages[0].contains("2 duplicate"));
    }

    #[test]
    fn structure_passes_sample() {
        assert!(validate_structure(&sample()).ok);
    }

    #[test]
    fn types_flag_non_numeric_nulls_and_range() {
        let raw = RawDataset::from_strs(
            &columns::REQUIRED,
            &[
                &["32", "JAWA BARAT", "3201", "KAB. BOGOR", "abc", "KASUS", "2021"],
                &["32", "", "3201", "KAB. BOGOR", "10", "KASUS", "1999"],
            ],
        );
        let report = validate_types(&raw);
        assert!(!report.ok);
        assert!(report.messages.iter().any(|m| m.contains("jumlah_kasus") && m.contains("not numeric")));
        assert!(report.messages.iter().any(|m| m.contains("nama_provinsi") && m.contains("empty")));
        assert!(report.messages.iter().any(|m| m.contains("outside 2000-2100")));
    }

    #[test]
    fn types_pass_sample() {
        assert!(validate_types(&sample()).ok);
    }

    #[test]
    fn business_rules_warn_but_pass() {
        let mut rows: Vec<Vec<String>> = (0..10)
            .map(|i| {
                vec![
                    "32".into(),
                    "JAWA BARAT".into(),
                    format!("32{:02}", i + 1),
                    "KAB".into(),
                    "10".into(),
                    "KASUS".into(),
                    "2022".into(),
                ]
            })
            .collect();
        rows[0][4] = "-5".into();
        rows[1][5] = "ORANG".into();
        let raw = RawDataset::with_rows(
            columns::REQUIRED.iter().map(|c| c.to_string()).collect(),
            rows.into_iter().map(|r| r.into_iter().map(Some).collect()).collect(),
        );
        let report = validate_business_rules(&raw);
        assert!(report.ok);
        assert!(report.messages.iter().any(|m| m.contains("negative")));
        assert!(report.messages.iter().any(|m| m.contains("inconsistent units")));
    }

    #[test]
    fn business_rules_detect_outlier() {
        let mut rows: Vec<Vec<Option<String>>> = Vec::new();
        for i in 0..200 {
            let count = if i == 0 { "100000" } else { "10" };
            rows.push(
                ["32", "JAWA BARAT", "3201", "KAB", count, "KASUS", "2022"]
                    .iter()
                    .map(|s| Some(s.to_string()))
                    .collect(),
            );
        }
        let raw = RawDataset::with_rows(columns::REQUIRED.iter().map(|c| c.to_string()).collect(), rows);
        let report = validate_business_rules(&raw);
        assert!(report.messages.iter().any(|m| m.contains("potential outliers")));
    }

    #[test]
    fn percentile_interpolates() {
        assert_eq!(percentile(&[], 0.5), None);
        assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 0.5), Some(2.5));
        assert_eq!(percentile(&[5.0], 0.99), Some(5.0));
        let p = percentile(&[0.0, 100.0], 0.99).unwrap();
        assert!((p - 99.0).abs() < 1e-9);
    }
}
