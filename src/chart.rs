//! Chart-ready data
//!
//! Every chart is computed from aggregation outputs (`group_sum`, `pivot`)
//! and serialized for whatever renders it. Nothing here draws.

use crate::aggregate::{group_sum, pivot, Agg, DatasetFilter, Field, KeyPart, PivotTable};
use crate::record::Dataset;
use crate::schema::percentile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which chart to build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartRequest {
    /// Yearly totals per province, optionally limited to some provinces
    BarTrend {
        #[serde(default)]
        provinces: Vec<String>,
    },
    /// Yearly totals per value of `group_by`
    LineTrend { group_by: Field },
    /// Region × year totals, for one province or the top-N regions overall
    Heatmap {
        #[serde(default)]
        province: Option<String>,
        top_n: usize,
    },
    /// Share of the top-N values of `group_by`
    Pie { group_by: Field, top_n: usize },
    /// Province → region totals
    Treemap,
    /// Province totals side by side for a set of years
    Comparison { years: Vec<i32> },
    /// Spread of per-row case counts for each value of `group_by`
    Box { group_by: Field },
}

impl ChartRequest {
    pub fn build(&self, dataset: &Dataset) -> ChartData {
        match self {
            Self::BarTrend { provinces } => bar_trend(dataset, provinces),
            Self::LineTrend { group_by } => line_trend(dataset, *group_by),
            Self::Heatmap { province, top_n } => heatmap(dataset, province.as_deref(), *top_n),
            Self::Pie { group_by, top_n } => pie(dataset, *group_by, *top_n),
            Self::Treemap => treemap(dataset),
            Self::Comparison { years } => comparison(dataset, years),
            Self::Box { group_by } => box_plot(dataset, *group_by),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: KeyPart,
    pub y: f64,
}

/// One named sequence of points, e.g. one province over the years
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    pub label: String,
    pub value: f64,
    /// Percent of the slices shown, not of the whole dataset
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub label: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

/// Five-number summary of one group, Tukey whiskers.
///
/// Whiskers end at the furthest values within 1.5 IQR of the quartiles;
/// values beyond them are listed in `outliers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxStats {
    pub label: KeyPart,
    pub count: usize,
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outliers: Vec<f64>,
}

/// Serializable chart payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "chart", rename_all = "snake_case")]
pub enum ChartData {
    Bar {
        title: String,
        x_label: String,
        y_label: String,
        series: Vec<Series>,
    },
    Line {
        title: String,
        x_label: String,
        y_label: String,
        series: Vec<Series>,
    },
    Heatmap {
        title: String,
        table: PivotTable,
    },
    Pie {
        title: String,
        slices: Vec<Slice>,
    },
    Treemap {
        title: String,
        roots: Vec<TreeNode>,
    },
    Box {
        title: String,
        y_label: String,
        boxes: Vec<BoxStats>,
    },
}

impl ChartData {
    pub fn title(&self) -> &str {
        match self {
            Self::Bar { title, .. }
            | Self::Line { title, .. }
            | Self::Heatmap { title, .. }
            | Self::Pie { title, .. }
            | Self::Treemap { title, .. }
            | Self::Box { title, .. } => title,
        }
    }

    /// True when there is nothing to draw
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bar { series, .. } | Self::Line { series, .. } => series.is_empty(),
            Self::Heatmap { table, .. } => table.row_labels.is_empty(),
            Self::Pie { slices, .. } => slices.is_empty(),
            Self::Treemap { roots, .. } => roots.is_empty(),
            Self::Box { boxes, .. } => boxes.is_empty(),
        }
    }
}

const CASES: &str = "cases";
const YEAR: &str = "year";

/// One series per value of `series_by`, x = year.
fn yearly_series(dataset: &Dataset, series_by: Field) -> Vec<Series> {
    let mut series: BTreeMap<String, Vec<Point>> = BTreeMap::new();
    for group in group_sum(dataset, &[series_by, Field::Year]).iter() {
        if let [name, year @ KeyPart::Year(_)] = group.key.parts() {
            series.entry(name.to_string()).or_default().push(Point {
                x: year.clone(),
                y: group.sum,
            });
        }
    }
    series
        .into_iter()
        .map(|(name, points)| Series { name, points })
        .collect()
}

pub fn bar_trend(dataset: &Dataset, provinces: &[String]) -> ChartData {
    let slice = if provinces.is_empty() {
        dataset.clone()
    } else {
        let mut filter = DatasetFilter::new();
        filter.provinces = provinces.to_vec();
        filter.apply(dataset)
    };
    ChartData::Bar {
        title: "DBD cases per year".to_string(),
        x_label: YEAR.to_string(),
        y_label: CASES.to_string(),
        series: yearly_series(&slice, Field::ProvinceName),
    }
}

pub fn line_trend(dataset: &Dataset, group_by: Field) -> ChartData {
    ChartData::Line {
        title: format!("DBD cases per year by {}", group_by),
        x_label: YEAR.to_string(),
        y_label: CASES.to_string(),
        series: yearly_series(dataset, group_by),
    }
}

/// Dense region × year table; rows ordered by total, largest first.
pub fn heatmap(dataset: &Dataset, province: Option<&str>, top_n: usize) -> ChartData {
    let (slice, title) = match province {
        Some(p) => (
            DatasetFilter::new().with_province(p).apply(dataset),
            format!("DBD cases heatmap - {}", p),
        ),
        None => (dataset.clone(), format!("DBD cases heatmap (top {})", top_n)),
    };
    let ranked = group_sum(&slice, &[Field::RegionName]).nlargest(match province {
        Some(_) => usize::MAX,
        None => top_n,
    });
    let order: Vec<KeyPart> = ranked
        .into_iter()
        .filter_map(|g| g.key.parts().first().cloned())
        .collect();
    let table = pivot(&slice, Field::RegionName, Field::Year, Agg::Sum, 0.0).select_rows(&order);
    ChartData::Heatmap { title, table }
}

pub fn pie(dataset: &Dataset, group_by: Field, top_n: usize) -> ChartData {
    let top = group_sum(dataset, &[group_by]).nlargest(top_n);
    let shown: f64 = top.iter().map(|g| g.sum).sum();
    let slices = top
        .into_iter()
        .map(|g| Slice {
            label: g.key.to_string(),
            value: g.sum,
            share_pct: if shown > 0.0 { g.sum / shown * 100.0 } else { 0.0 },
        })
        .collect();
    ChartData::Pie {
        title: format!("DBD case distribution by {} (top {})", group_by, top_n),
        slices,
    }
}

pub fn treemap(dataset: &Dataset) -> ChartData {
    let mut provinces: BTreeMap<String, Vec<TreeNode>> = BTreeMap::new();
    for group in group_sum(dataset, &[Field::ProvinceName, Field::RegionName]).iter() {
        if let [province, region] = group.key.parts() {
            provinces.entry(province.to_string()).or_default().push(TreeNode {
                label: region.to_string(),
                value: group.sum,
                children: Vec::new(),
            });
        }
    }
    let roots = provinces
        .into_iter()
        .map(|(label, children)| TreeNode {
            label,
            value: children.iter().map(|c| c.value).sum(),
            children,
        })
        .collect();
    ChartData::Treemap {
        title: "DBD cases by province and region".to_string(),
        roots,
    }
}

/// One bar series per requested year, x = province.
pub fn comparison(dataset: &Dataset, years: &[i32]) -> ChartData {
    let grouped = group_sum(dataset, &[Field::Year, Field::ProvinceName]);
    let series = years
        .iter()
        .map(|year| Series {
            name: year.to_string(),
            points: grouped
                .iter()
                .filter(|g| g.key.year() == Some(*year))
                .filter_map(|g| {
                    g.key.parts().get(1).map(|province| Point {
                        x: province.clone(),
                        y: g.sum,
                    })
                })
                .collect(),
        })
        .collect();
    ChartData::Bar {
        title: "DBD cases compared across years".to_string(),
        x_label: "province".to_string(),
        y_label: CASES.to_string(),
        series,
    }
}

pub fn box_plot(dataset: &Dataset, group_by: Field) -> ChartData {
    let mut groups: BTreeMap<KeyPart, Vec<f64>> = BTreeMap::new();
    for record in dataset {
        groups.entry(group_by.value(record)).or_default().push(record.case_count);
    }
    let boxes = groups
        .into_iter()
        .filter_map(|(label, values)| box_stats(label, &values))
        .collect();
    ChartData::Box {
        title: format!("DBD case distribution by {}", group_by),
        y_label: CASES.to_string(),
        boxes,
    }
}

fn box_stats(label: KeyPart, values: &[f64]) -> Option<BoxStats> {
    let q1 = percentile(values, 0.25)?;
    let median = percentile(values, 0.5)?;
    let q3 = percentile(values, 0.75)?;
    let reach = 1.5 * (q3 - q1);
    let (low_fence, high_fence) = (q1 - reach, q3 + reach);

    let inside = values.iter().copied().filter(|v| (low_fence..=high_fence).contains(v));
    let lower_whisker = inside.clone().fold(f64::INFINITY, f64::min);
    let upper_whisker = inside.fold(f64::NEG_INFINITY, f64::max);
    let mut outliers: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| !(low_fence..=high_fence).contains(v))
        .collect();
    outliers.sort_by(|a, b| a.total_cmp(b));

    Some(BoxStats {
        label,
        count: values.len(),
        lower_whisker,
        q1,
        median,
        q3,
        upper_whisker,
        outliers,
    })
}
