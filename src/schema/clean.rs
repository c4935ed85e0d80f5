use crate::record::{canonical_number, columns, parse_code, parse_number, parse_year, RawDataset, RawRow};
use std::collections::HashSet;
use tracing::debug;

/// Produce a cleaned copy of a raw table.
///
/// Cells are trimmed first and blank cells become nulls; rows with a
/// null required cell, a value that does not coerce or a negative case
/// count are dropped; numeric columns are rewritten in canonical form; exact
/// duplicates are dropped last, keeping the first. Running `clean` on its
/// own output returns it unchanged.
pub fn clean(raw: &RawDataset) -> RawDataset {
    let required: Vec<Option<usize>> = columns::REQUIRED.iter().map(|c| raw.column_index(c)).collect();
    let count_idx = raw.column_index(columns::CASE_COUNT);
    let year_idx = raw.column_index(columns::YEAR);
    let province_idx = raw.column_index(columns::PROVINCE_CODE);

    let mut out = RawDataset::new(raw.headers().to_vec());
    let mut seen: HashSet<RawRow> = HashSet::new();
    let mut dropped = 0usize;

    for row in raw.rows() {
        let mut row: RawRow = row
            .iter()
            .map(|cell| {
                cell.as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .collect();

        let has_null = required
            .iter()
            .flatten()
            .any(|&idx| row.get(idx).map_or(true, Option::is_none));
        if has_null {
            dropped += 1;
            continue;
        }

        if !canonicalize(&mut row, count_idx, |v| {
            parse_number(v).filter(|n| *n >= 0.0).map(canonical_number)
        }) || !canonicalize(&mut row, year_idx, |v| parse_year(v).map(|y| y.to_string()))
            || !canonicalize(&mut row, province_idx, parse_code)
        {
            dropped += 1;
            continue;
        }

        if !seen.insert(row.clone()) {
            dropped += 1;
            continue;
        }
        out.push_row(row);
    }

    debug!(kept = out.len(), dropped, "cleaned dataset");
    out
}

/// Rewrite one cell through `coerce`; false when the value does not coerce.
fn canonicalize(row: &mut RawRow, idx: Option<usize>, coerce: impl Fn(&str) -> Option<String>) -> bool {
    let Some(idx) = idx else { return true };
    match row.get(idx).cloned().flatten() {
        Some(value) => match coerce(&value) {
            Some(canonical) => {
                row[idx] = Some(canonical);
                true
            }
            None => false,
        },
        None => true,
    }
}
