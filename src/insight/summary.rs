//! Structured statistics handed to the text-generation service

use crate::aggregate::{group_growth, group_sum, growth_rate, mean_and_std, total_and_mean, Field, KeyPart};
use crate::record::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionTotal {
    pub region_code: String,
    pub region_name: String,
    pub total_cases: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionGrowth {
    pub region_code: String,
    pub region_name: String,
    pub growth_pct: f64,
}

/// Everything a narrative is grounded on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredSummary {
    pub total_cases: f64,
    pub mean_cases: f64,
    pub provinces: usize,
    pub regions: usize,
    pub year_range: Option<(i32, i32)>,
    /// Total cases per year
    pub yearly_totals: BTreeMap<i32, f64>,
    pub yearly_mean: f64,
    pub yearly_std: f64,
    pub national_growth_pct: f64,
    pub top_regions: Vec<RegionTotal>,
    /// Regions with at least two years of data, fastest growing first
    pub region_growth: Vec<RegionGrowth>,
}

/// Summarize a dataset. `top_n` bounds both region lists.
pub fn build_summary(dataset: &Dataset, top_n: usize) -> StructuredSummary {
    let (total, mean) = total_and_mean(dataset);

    let yearly_totals: BTreeMap<i32, f64> = group_sum(dataset, &[Field::Year])
        .iter()
        .filter_map(|g| g.key.year().map(|y| (y, g.sum)))
        .collect();
    let yearly: Vec<f64> = yearly_totals.values().copied().collect();
    let (yearly_mean, yearly_std) = mean_and_std(&yearly).unwrap_or((0.0, 0.0));

    let names = region_names(dataset);
    let name_of = |code: &str| names.get(code).cloned().unwrap_or_default();

    let top_regions = group_sum(dataset, &[Field::RegionCode])
        .nlargest(top_n)
        .into_iter()
        .map(|g| {
            let code = g.key.to_string();
            RegionTotal {
                region_name: name_of(&code),
                region_code: code,
                total_cases: g.sum,
            }
        })
        .collect();

    let years_per_region = years_per_region(dataset);
    let mut region_growth: Vec<RegionGrowth> = group_growth(dataset, &[Field::RegionCode])
        .into_iter()
        .filter_map(|(key, growth_pct)| {
            let code = match key.parts().first() {
                Some(KeyPart::Text(code)) => code.clone(),
                _ => return None,
            };
            (years_per_region.get(&code).copied().unwrap_or(0) > 1).then(|| RegionGrowth {
                region_name: name_of(&code),
                region_code: code,
                growth_pct,
            })
        })
        .collect();
    region_growth.sort_by(|a, b| b.growth_pct.total_cmp(&a.growth_pct));
    region_growth.truncate(top_n);

    StructuredSummary {
        total_cases: total,
        mean_cases: mean,
        provinces: dataset.iter().map(|r| &r.province_name).collect::<BTreeSet<_>>().len(),
        regions: dataset.iter().map(|r| &r.region_code).collect::<BTreeSet<_>>().len(),
        year_range: yearly_totals
            .keys()
            .next()
            .zip(yearly_totals.keys().next_back())
            .map(|(a, b)| (*a, *b)),
        national_growth_pct: growth_rate(&yearly),
        yearly_totals,
        yearly_mean,
        yearly_std,
        top_regions,
        region_growth,
    }
}

fn region_names(dataset: &Dataset) -> BTreeMap<String, String> {
    let mut names = BTreeMap::new();
    for r in dataset {
        names
            .entry(r.region_code.clone())
            .or_insert_with(|| r.region_name.clone());
    }
    names
}

fn years_per_region(dataset: &Dataset) -> BTreeMap<String, usize> {
    let mut years: BTreeMap<String, BTreeSet<i32>> = BTreeMap::new();
    for r in dataset {
        years.entry(r.region_code.clone()).or_default().insert(r.year);
    }
    years.into_iter().map(|(k, v)| (k, v.len())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CaseRecord, RecordId};

    fn rec(region: &str, name: &str, cases: f64, year: i32) -> CaseRecord {
        CaseRecord {
            id: RecordId::new(0),
            province_code: "32".into(),
            province_name: "JAWA BARAT".into(),
            region_code: region.into(),
            region_name: name.into(),
            case_count: cases,
            unit: "KASUS".into(),
            year,
        }
    }

    #[test]
    fn summary_of_small_dataset() {
        let ds = Dataset::from_records(vec![
            rec("3201", "KAB. BOGOR", 100.0, 2021),
            rec("3201", "KAB. BOGOR", 150.0, 2022),
            rec("3273", "KOTA BANDUNG", 50.0, 2021),
            rec("3273", "KOTA BANDUNG", 50.0, 2022),
            rec("3279", "KOTA BANJAR", 5.0, 2022),
        ]);
        let s = build_summary(&ds, 2);

        assert_eq!(s.total_cases, 355.0);
        assert_eq!(s.yearly_totals.get(&2021), Some(&150.0));
        assert_eq!(s.yearly_totals.get(&2022), Some(&205.0));
        assert_eq!(s.year_range, Some((2021, 2022)));
        assert_eq!(s.regions, 3);
        assert_eq!(s.provinces, 1);

        assert_eq!(s.top_regions.len(), 2);
        assert_eq!(s.top_regions[0].region_name, "KAB. BOGOR");
        assert_eq!(s.top_regions[0].total_cases, 250.0);

        // KOTA BANJAR has a single year and is left out
        assert_eq!(s.region_growth.len(), 2);
        assert_eq!(s.region_growth[0].region_code, "3201");
        assert_eq!(s.region_growth[0].growth_pct, 50.0);
    }

    #[test]
    fn summary_of_empty_dataset() {
        let s = build_summary(&Dataset::new(), 10);
        assert_eq!(s.total_cases, 0.0);
        assert_eq!(s.mean_cases, 0.0);
        assert_eq!(s.year_range, None);
        assert!(s.top_regions.is_empty());
        assert_eq!(s.national_growth_pct, 0.0);
    }

    #[test]
    fn summary_serializes_to_json() {
        let ds = Dataset::from_records(vec![rec("3201", "KAB. BOGOR", 1.0, 2021)]);
        let json = serde_json::to_value(build_summary(&ds, 5)).unwrap();
        assert_eq!(json["yearly_totals"]["2021"], 1.0);
    }
}
