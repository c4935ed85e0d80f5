//! Untyped table as read from disk, before validation and cleaning

use super::columns;
use serde::{Deserialize, Serialize};

/// One row of optional cells, aligned with `RawDataset::headers`.
///
/// `None` is a null (blank) cell.
pub type RawRow = Vec<Option<String>>;

/// A header row plus data rows of optional text cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDataset {
    headers: Vec<String>,
    rows: Vec<RawRow>,
}

impl RawDataset {
    /// Create an empty table with the given headers
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Create a table from headers and rows. Rows are padded or truncated
    /// to the header width.
    pub fn with_rows(headers: Vec<String>, rows: Vec<RawRow>) -> Self {
        let mut table = Self::new(headers);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Build a table from string literals; blank cells become nulls.
    pub fn from_strs(headers: &[&str], rows: &[&[&str]]) -> Self {
        let headers = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            None
                        } else {
                            Some(cell.to_string())
                        }
                    })
                    .collect()
            })
            .collect();
        Self::with_rows(headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, mut row: RawRow) {
        row.resize(self.headers.len(), None);
        self.rows.push(row);
    }

    /// Position of a column by exact header name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell text at a row and column name; `None` when null or the column is absent.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// All cells of one column, `None` for nulls. Empty when the column is absent.
    pub fn column(&self, column: &str) -> Vec<Option<&str>> {
        match self.column_index(column) {
            Some(idx) => self.rows.iter().map(|r| r[idx].as_deref()).collect(),
            None => Vec::new(),
        }
    }

    /// Required columns missing from the header, in canonical order.
    pub fn missing_columns(&self) -> Vec<&'static str> {
        columns::REQUIRED
            .iter()
            .copied()
            .filter(|c| !self.has_column(c))
            .collect()
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<RawRow> {
        &mut self.rows
    }
}
