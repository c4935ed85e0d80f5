//! Descriptive statistics over a dataset

use super::group::{group_sum, Field, GroupKey, KeyPart};
use crate::record::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Sum of case counts and mean per record. The mean of an empty dataset is 0.
pub fn total_and_mean(dataset: &Dataset) -> (f64, f64) {
    let total: f64 = dataset.iter().map(|r| r.case_count).sum();
    let mean = if dataset.is_empty() {
        0.0
    } else {
        total / dataset.len() as f64
    };
    (total, mean)
}

/// Percent change from the first to the last value.
///
/// 0 when there are fewer than two values or the first value is 0.
pub fn growth_rate(series: &[f64]) -> f64 {
    match (series.first(), series.last()) {
        (Some(&first), Some(&last)) if series.len() >= 2 && first != 0.0 => {
            (last - first) / first * 100.0
        }
        _ => 0.0,
    }
}

/// Mean and sample standard deviation. `None` for an empty slice;
/// the deviation of a single value is 0.
pub fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return Some((mean, 0.0));
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, var.sqrt()))
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Overview of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub records: usize,
    pub total_cases: f64,
    pub mean_cases: f64,
    pub median_cases: f64,
    pub min_cases: f64,
    pub max_cases: f64,
    pub std_cases: f64,
    pub provinces: usize,
    pub regions: usize,
    pub year_range: Option<(i32, i32)>,
    pub years: usize,
}

pub fn summary_statistics(dataset: &Dataset) -> SummaryStatistics {
    let counts: Vec<f64> = dataset.iter().map(|r| r.case_count).collect();
    let (total, mean) = total_and_mean(dataset);
    let std = mean_and_std(&counts).map_or(0.0, |(_, s)| s);
    let years: BTreeSet<i32> = dataset.iter().map(|r| r.year).collect();

    SummaryStatistics {
        records: dataset.len(),
        total_cases: total,
        mean_cases: mean,
        median_cases: median(&counts),
        min_cases: counts.iter().copied().reduce(f64::min).unwrap_or(0.0),
        max_cases: counts.iter().copied().reduce(f64::max).unwrap_or(0.0),
        std_cases: std,
        provinces: dataset.iter().map(|r| r.province_name.as_str()).collect::<BTreeSet<_>>().len(),
        regions: dataset.iter().map(|r| r.region_name.as_str()).collect::<BTreeSet<_>>().len(),
        year_range: years.first().zip(years.last()).map(|(a, b)| (*a, *b)),
        years: years.len(),
    }
}

/// Totals for one province in one year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvinceYear {
    pub province_name: String,
    pub year: i32,
    pub total_cases: f64,
    pub mean_cases: f64,
    pub records: usize,
    pub regions: usize,
}

/// Per province and year: total, mean, record count and distinct regions.
pub fn aggregate_by_province_year(dataset: &Dataset) -> Vec<ProvinceYear> {
    let mut acc: BTreeMap<(String, i32), (f64, usize, BTreeSet<String>)> = BTreeMap::new();
    for r in dataset {
        let entry = acc
            .entry((r.province_name.clone(), r.year))
            .or_insert_with(|| (0.0, 0, BTreeSet::new()));
        entry.0 += r.case_count;
        entry.1 += 1;
        entry.2.insert(r.region_name.clone());
    }
    acc.into_iter()
        .map(|((province_name, year), (total, count, regions))| ProvinceYear {
            province_name,
            year,
            total_cases: total,
            mean_cases: total / count as f64,
            records: count,
            regions: regions.len(),
        })
        .collect()
}

/// Yearly total of one group and its change from the group's previous year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearChange {
    pub group: GroupKey,
    pub year: i32,
    pub total_cases: f64,
    /// `None` for a group's first year, or when the previous total was 0
    pub change_pct: Option<f64>,
}

/// Year-over-year percent change of yearly totals within each group.
pub fn year_over_year(dataset: &Dataset, by: &[Field]) -> Vec<YearChange> {
    yearly_series(dataset, by)
        .into_iter()
        .flat_map(|(group, series)| {
            let mut prev: Option<f64> = None;
            series
                .into_iter()
                .map(|(year, total)| {
                    let change_pct = prev.filter(|p| *p != 0.0).map(|p| (total - p) / p * 100.0);
                    prev = Some(total);
                    YearChange {
                        group: group.clone(),
                        year,
                        total_cases: total,
                        change_pct,
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Growth rate of each group across its years, ordered by group key.
pub fn group_growth(dataset: &Dataset, by: &[Field]) -> Vec<(GroupKey, f64)> {
    yearly_series(dataset, by)
        .into_iter()
        .map(|(group, series)| {
            let values: Vec<f64> = series.into_iter().map(|(_, v)| v).collect();
            (group, growth_rate(&values))
        })
        .collect()
}

/// Year-ordered totals per group
fn yearly_series(dataset: &Dataset, by: &[Field]) -> BTreeMap<GroupKey, Vec<(i32, f64)>> {
    let mut fields = by.to_vec();
    fields.push(Field::Year);
    let mut series: BTreeMap<GroupKey, Vec<(i32, f64)>> = BTreeMap::new();
    for group in group_sum(dataset, &fields).groups {
        let mut parts = group.key.0;
        let year = match parts.pop() {
            Some(KeyPart::Year(y)) => y,
            _ => continue,
        };
        series.entry(GroupKey(parts)).or_default().push((year, group.sum));
    }
    series
}
