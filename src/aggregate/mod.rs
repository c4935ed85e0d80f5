//! Aggregation engine
//!
//! Pure functions over a `Dataset`: totals, grouping, pivots, growth and
//! descriptive statistics. Nothing here touches storage.

mod filter;
mod group;
mod stats;

pub use filter::DatasetFilter;
pub use group::{group_sum, pivot, Agg, Field, Group, GroupKey, Grouped, KeyPart, PivotTable};
pub use stats::{
    aggregate_by_province_year, group_growth, growth_rate, mean_and_std, summary_statistics,
    total_and_mean, year_over_year, ProvinceYear, SummaryStatistics, YearChange,
};
