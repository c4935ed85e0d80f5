//! Prompt construction for each kind of narrative

use super::client::InsightError;
use super::summary::{build_summary, RegionTotal};
use crate::aggregate::{group_sum, growth_rate, total_and_mean, DatasetFilter, Field};
use crate::record::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const LANGUAGE_NOTE: &str = "Write the answer in Bahasa Indonesia.";

/// What kind of narrative to ask for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsightRequest {
    /// Full situation analysis, optionally stressing some aspects
    Comprehensive {
        #[serde(default)]
        focus_areas: Vec<String>,
    },
    /// Short, medium and long term mitigation plan
    Mitigation {
        #[serde(default)]
        province: Option<String>,
    },
    /// One province, or one region within it
    AreaAnalysis {
        province: String,
        #[serde(default)]
        region: Option<String>,
    },
    ComparePeriods { first_year: i32, second_year: i32 },
    ExecutiveReport { audience: String },
}

impl InsightRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Comprehensive { .. } => "comprehensive",
            Self::Mitigation { .. } => "mitigation",
            Self::AreaAnalysis { .. } => "area_analysis",
            Self::ComparePeriods { .. } => "compare_periods",
            Self::ExecutiveReport { .. } => "executive_report",
        }
    }

    /// Short label of what the request is about, kept in the history
    pub fn scope(&self) -> String {
        match self {
            Self::Comprehensive { .. } => "all regions".to_string(),
            Self::Mitigation { province } => province.clone().unwrap_or_else(|| "all regions".to_string()),
            Self::AreaAnalysis { province, region } => area_name(province, region.as_deref()),
            Self::ComparePeriods { first_year, second_year } => format!("{} vs {}", first_year, second_year),
            Self::ExecutiveReport { audience } => audience.clone(),
        }
    }

    /// Render the prompt for `dataset`.
    ///
    /// Fails with `InsightError::NoData` when the requested slice is empty.
    pub fn prompt(&self, dataset: &Dataset, top_n: usize) -> Result<String, InsightError> {
        if dataset.is_empty() {
            return Err(InsightError::NoData("dataset is empty".to_string()));
        }
        match self {
            Self::Comprehensive { focus_areas } => {
                let summary = to_json(&build_summary(dataset, top_n))?;
                let focus = if focus_areas.is_empty() {
                    String::new()
                } else {
                    format!("\nPay particular attention to: {}\n", focus_areas.join(", "))
                };
                Ok(format!(
                    "As an epidemiologist and data scientist, analyse the following dengue fever (DBD) case data.\n\n\
                     DATA SUMMARY:\n{summary}\n{focus}\n\
                     Structure the analysis as:\n\
                     ## 1. Executive summary\n\
                     ## 2. Overall trend: year-to-year pattern, critical periods, growth\n\
                     ## 3. Regional analysis: highest-burden regions, hotspots, geographic pattern\n\
                     ## 4. Growth analysis: fastest growing and declining regions, likely drivers\n\
                     ## 5. Priority mitigation: 7-10 concrete actions a health office can take, most urgent first\n\
                     ## 6. Early warning: regions to watch, outbreak indicators, surveillance advice\n\
                     ## 7. Key insights for stakeholders\n\n\
                     Use concrete figures from the data. {LANGUAGE_NOTE}"
                ))
            }
            Self::Mitigation { province } => {
                let slice = match province {
                    Some(p) => non_empty(DatasetFilter::new().with_province(p.clone()).apply(dataset), p)?,
                    None => dataset.clone(),
                };
                let scope = self.scope();
                let summary = to_json(&build_summary(&slice, top_n))?;
                Ok(format!(
                    "As a public health consultant, write a dengue (DBD) mitigation plan for {scope}.\n\n\
                     DATA:\n{summary}\n\n\
                     Cover:\n\
                     ### 1. Short-term interventions (1-3 months)\n\
                     ### 2. Medium-term programmes (3-12 months)\n\
                     ### 3. Long-term strategy (1-3 years)\n\
                     ### 4. Resource allocation\n\
                     ### 5. Key performance indicators with realistic targets\n\
                     ### 6. Stakeholders and coordination\n\n\
                     Make every recommendation specific, measurable, achievable, relevant and time-bound. {LANGUAGE_NOTE}"
                ))
            }
            Self::AreaAnalysis { province, region } => {
                let name = self.scope();
                let mut filter = DatasetFilter::new().with_province(province.clone());
                if let Some(region) = region {
                    let codes: Vec<String> = dataset
                        .iter()
                        .filter(|r| &r.region_name == region || &r.region_code == region)
                        .map(|r| r.region_code.clone())
                        .collect();
                    filter.regions = if codes.is_empty() { vec![region.clone()] } else { codes };
                }
                let area = non_empty(filter.apply(dataset), &name)?;
                let (total, mean) = total_and_mean(&area);
                let trend = yearly_totals(&area);
                let overall = yearly_totals(dataset);
                let share: BTreeMap<i32, f64> = trend
                    .iter()
                    .filter_map(|(year, value)| {
                        overall
                            .get(year)
                            .filter(|t| **t > 0.0)
                            .map(|t| (*year, round2(value / t * 100.0)))
                    })
                    .collect();
                Ok(format!(
                    "Analyse dengue (DBD) cases in {name} in depth.\n\n\
                     AREA DATA:\n\
                     - Total cases: {total}\n\
                     - Mean cases per record: {mean}\n\
                     - Yearly totals: {trend}\n\
                     - Share of all cases per year (%): {share}\n\n\
                     Cover: area profile; trend analysis; potential risk factors (geographic, demographic, environmental, socio-economic); \
                     root causes of the pattern; 5-7 recommendations specific to {name}; transferable best practices. {LANGUAGE_NOTE}",
                    total = total,
                    mean = round2(mean),
                    trend = to_json(&trend)?,
                    share = to_json(&share)?,
                ))
            }
            Self::ComparePeriods { first_year, second_year } => {
                let first = period(dataset, *first_year, top_n.min(5));
                let second = period(dataset, *second_year, top_n.min(5));
                let change = growth_rate(&[first.total_cases, second.total_cases]);
                let data = to_json(&[&first, &second])?;
                Ok(format!(
                    "Compare the dengue (DBD) situation between {first_year} and {second_year}.\n\n\
                     COMPARISON DATA:\n{data}\n\n\
                     Change in total cases: {change:.2}%\n\n\
                     Cover: overall change and its significance; regions with the largest increase and decrease; shifting hotspots; \
                     likely factors (interventions, weather, policy, surveillance changes); lessons learned; what to do next. {LANGUAGE_NOTE}"
                ))
            }
            Self::ExecutiveReport { audience } => {
                let summary = to_json(&build_summary(dataset, top_n))?;
                let date = chrono::Utc::now().format("%d %B %Y");
                Ok(format!(
                    "Write an executive report on the dengue (DBD) situation for {audience}.\n\n\
                     DATA:\n{summary}\n\n\
                     Format:\n\
                     # EXECUTIVE REPORT: DBD SITUATION\n\
                     **For: {audience}**\n\
                     **Date: {date}**\n\
                     ## Executive summary (2-3 paragraphs)\n\
                     ## Highlights (3-5 points)\n\
                     ## Current situation: overall picture and critical areas with level of concern\n\
                     ## Trend and outlook\n\
                     ## Strategic recommendations: immediate (0-1 month) and strategic (1-6 months)\n\
                     ## Resource needs\n\
                     ## Risk assessment\n\
                     ## Conclusion\n\n\
                     Keep it concise and free of unnecessary jargon. {LANGUAGE_NOTE}"
                ))
            }
        }
    }
}

/// Totals of one year, used by period comparisons
#[derive(Debug, Clone, PartialEq, Serialize)]
struct Period {
    year: i32,
    total_cases: f64,
    top_regions: Vec<RegionTotal>,
}

fn period(dataset: &Dataset, year: i32, top_n: usize) -> Period {
    let slice = DatasetFilter::new().with_year(year).apply(dataset);
    let summary = build_summary(&slice, top_n);
    Period {
        year,
        total_cases: summary.total_cases,
        top_regions: summary.top_regions,
    }
}

fn yearly_totals(dataset: &Dataset) -> BTreeMap<i32, f64> {
    group_sum(dataset, &[Field::Year])
        .iter()
        .filter_map(|g| g.key.year().map(|y| (y, g.sum)))
        .collect()
}

fn area_name(province: &str, region: Option<&str>) -> String {
    match region {
        Some(region) => format!("{}, {}", region, province),
        None => province.to_string(),
    }
}

fn non_empty(slice: Dataset, label: &str) -> Result<Dataset, InsightError> {
    if slice.is_empty() {
        Err(InsightError::NoData(format!("no data for {}", label)))
    } else {
        Ok(slice)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, InsightError> {
    serde_json::to_string_pretty(value).map_err(|e| InsightError::Prompt(e.to_string()))
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

    fn sample() -> Dataset {
        Dataset::from_records(vec![
            rec("3201", "KAB. BOGOR", 100.0, 2021),
            rec("3201", "KAB. BOGOR", 150.0, 2022),
            rec("3273", "KOTA BANDUNG", 100.0, 2021),
            rec("3273", "KOTA BANDUNG", 50.0, 2022),
        ])
    }

    #[test]
    fn comprehensive_prompt_embeds_summary_and_focus() {
        let request = InsightRequest::Comprehensive {
            focus_areas: vec!["rainy season".into()],
        };
        let prompt = request.prompt(&sample(), 10).unwrap();
        assert!(prompt.contains("\"total_cases\": 400.0"));
        assert!(prompt.contains("rainy season"));
        assert!(prompt.contains("KAB. BOGOR"));
    }

    #[test]
    fn area_prompt_includes_share_of_yearly_totals() {
        let request = InsightRequest::AreaAnalysis {
            province: "JAWA BARAT".into(),
            region: Some("KAB. BOGOR".into()),
        };
        let prompt = request.prompt(&sample(), 10).unwrap();
        assert!(prompt.contains("KAB. BOGOR, JAWA BARAT"));
        assert!(prompt.contains("\"2021\": 50.0"));
        assert!(prompt.contains("\"2022\": 75.0"));
    }

    #[test]
    fn area_prompt_for_unknown_area_is_no_data() {
        let request = InsightRequest::AreaAnalysis {
            province: "BANTEN".into(),
            region: None,
        };
        assert!(matches!(request.prompt(&sample(), 10), Err(InsightError::NoData(_))));
    }

    #[test]
    fn compare_periods_reports_change() {
        let request = InsightRequest::ComparePeriods {
            first_year: 2021,
            second_year: 2022,
        };
        let prompt = request.prompt(&sample(), 10).unwrap();
        assert!(prompt.contains("Change in total cases: 0.00%"));
        assert_eq!(request.scope(), "2021 vs 2022");
    }

    #[test]
    fn empty_dataset_is_no_data() {
        let request = InsightRequest::ExecutiveReport { audience: "Head of Health Office".into() };
        assert!(matches!(request.prompt(&Dataset::new(), 10), Err(InsightError::NoData(_))));
    }

    #[test]
    fn request_deserializes_from_tagged_json() {
        let request: InsightRequest = serde_json::from_str(r#"{"kind":"mitigation"}"#).unwrap();
        assert_eq!(request, InsightRequest::Mitigation { province: None });
        assert_eq!(request.kind(), "mitigation");
    }
}
