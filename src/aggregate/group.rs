//! Grouping and pivoting of case counts

use crate::record::CaseRecord;
use crate::record::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A record attribute usable as a grouping key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Year,
    ProvinceCode,
    ProvinceName,
    RegionCode,
    RegionName,
    Unit,
}

impl Field {
    /// The key value of this field for one record
    pub fn value(self, record: &CaseRecord) -> KeyPart {
        match self {
            Field::Year => KeyPart::Year(record.year),
            Field::ProvinceCode => KeyPart::Text(record.province_code.clone()),
            Field::ProvinceName => KeyPart::Text(record.province_name.clone()),
            Field::RegionCode => KeyPart::Text(record.region_code.clone()),
            Field::RegionName => KeyPart::Text(record.region_name.clone()),
            Field::Unit => KeyPart::Text(record.unit.clone()),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "year" | "tahun" => Some(Field::Year),
            "province_code" | "kode_provinsi" => Some(Field::ProvinceCode),
            "province" | "province_name" | "nama_provinsi" => Some(Field::ProvinceName),
            "region_code" | "kode_kabupaten_kota" => Some(Field::RegionCode),
            "region" | "region_name" | "nama_kabupaten_kota" => Some(Field::RegionName),
            "unit" | "satuan" => Some(Field::Unit),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Field::Year => "year",
            Field::ProvinceCode => "province_code",
            Field::ProvinceName => "province_name",
            Field::RegionCode => "region_code",
            Field::RegionName => "region_name",
            Field::Unit => "unit",
        };
        write!(f, "{}", s)
    }
}

/// One component of a group key. Years order numerically, text lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    Year(i32),
    Text(String),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Year(y) => write!(f, "{}", y),
            KeyPart::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Composite key, one part per grouping field
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(pub Vec<KeyPart>);

impl GroupKey {
    pub fn of(record: &CaseRecord, by: &[Field]) -> Self {
        Self(by.iter().map(|f| f.value(record)).collect())
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Year component, if the key has one
    pub fn year(&self) -> Option<i32> {
        self.0.iter().find_map(|p| match p {
            KeyPart::Year(y) => Some(*y),
            KeyPart::Text(_) => None,
        })
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join(" / "))
    }
}

/// Sum and count of one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub key: GroupKey,
    pub sum: f64,
    pub count: usize,
    /// Index of the first record that fell into this group
    #[serde(skip)]
    first_seen: usize,
}

impl Group {
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Groups ordered by key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grouped {
    pub by: Vec<Field>,
    pub groups: Vec<Group>,
}

impl Grouped {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Group> {
        self.groups.iter()
    }

    pub fn get(&self, key: &GroupKey) -> Option<&Group> {
        self.groups
            .binary_search_by(|g| g.key.cmp(key))
            .ok()
            .map(|i| &self.groups[i])
    }

    /// Sum over all groups
    pub fn total(&self) -> f64 {
        self.groups.iter().map(|g| g.sum).sum()
    }

    /// The `n` groups with the largest sums, ties in dataset order.
    pub fn nlargest(&self, n: usize) -> Vec<Group> {
        let mut ranked = self.groups.clone();
        ranked.sort_by(|a, b| b.sum.total_cmp(&a.sum).then(a.first_seen.cmp(&b.first_seen)));
        ranked.truncate(n);
        ranked
    }
}

/// Sum case counts grouped by the given fields.
pub fn group_sum(dataset: &Dataset, by: &[Field]) -> Grouped {
    let mut map: BTreeMap<GroupKey, Group> = BTreeMap::new();
    for (i, record) in dataset.iter().enumerate() {
        let key = GroupKey::of(record, by);
        let group = map.entry(key.clone()).or_insert_with(|| Group {
            key,
            sum: 0.0,
            count: 0,
            first_seen: i,
        });
        group.sum += record.case_count;
        group.count += 1;
    }
    Grouped {
        by: by.to_vec(),
        groups: map.into_values().collect(),
    }
}

/// Aggregation applied to each pivot cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agg {
    Sum,
    Mean,
    Count,
}

/// Dense two-way table; every row/column combination has a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotTable {
    pub row_labels: Vec<KeyPart>,
    pub column_labels: Vec<KeyPart>,
    /// `values[row][column]`
    pub values: Vec<Vec<f64>>,
}

impl PivotTable {
    pub fn get(&self, row: &KeyPart, column: &KeyPart) -> Option<f64> {
        let r = self.row_labels.iter().position(|l| l == row)?;
        let c = self.column_labels.iter().position(|l| l == column)?;
        Some(self.values[r][c])
    }

    /// Sum of one row
    pub fn row_total(&self, row: usize) -> f64 {
        self.values.get(row).map_or(0.0, |r| r.iter().sum())
    }

    /// Keep only the given rows, in the given order. Unknown labels are skipped.
    pub fn select_rows(&self, labels: &[KeyPart]) -> PivotTable {
        let mut row_labels = Vec::new();
        let mut values = Vec::new();
        for label in labels {
            if let Some(idx) = self.row_labels.iter().position(|l| l == label) {
                row_labels.push(label.clone());
                values.push(self.values[idx].clone());
            }
        }
        PivotTable {
            row_labels,
            column_labels: self.column_labels.clone(),
            values,
        }
    }
}

/// Pivot `index` against `columns`, filling absent combinations with `fill`.
pub fn pivot(dataset: &Dataset, index: Field, columns: Field, agg: Agg, fill: f64) -> PivotTable {
    let mut cells: BTreeMap<(KeyPart, KeyPart), (f64, usize)> = BTreeMap::new();
    let mut rows = std::collections::BTreeSet::new();
    let mut cols = std::collections::BTreeSet::new();

    for record in dataset {
        let r = index.value(record);
        let c = columns.value(record);
        rows.insert(r.clone());
        cols.insert(c.clone());
        let cell = cells.entry((r, c)).or_insert((0.0, 0));
        cell.0 += record.case_count;
        cell.1 += 1;
    }

    let row_labels: Vec<KeyPart> = rows.into_iter().collect();
    let column_labels: Vec<KeyPart> = cols.into_iter().collect();
    let values = row_labels
        .iter()
        .map(|r| {
            column_labels
                .iter()
                .map(|c| match cells.get(&(r.clone(), c.clone())) {
                    Some((sum, count)) => match agg {
                        Agg::Sum => *sum,
                        Agg::Mean => *sum / *count as f64,
                        Agg::Count => *count as f64,
                    },
                    None => fill,
                })
                .collect()
        })
        .collect();

    PivotTable {
        row_labels,
        column_labels,
        values,
    }
}
