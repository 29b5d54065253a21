//! In-Memory Dataset

use crate::value::RawValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Declared type of a column, decided from its non-missing cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Every present cell is numeric
    Numeric,
    /// At least one present cell is text
    Textual,
    /// No present cells at all
    Empty,
}

/// Rectangular table of raw cells, rows aligned with `columns`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<RawValue>>,
}

impl Dataset {
    /// Build a dataset from already-normalized parts
    ///
    /// Rows are padded or truncated to the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<RawValue>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, RawValue::Missing);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<RawValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of a column, in row order
    pub fn column(&self, name: &str) -> Option<Vec<&RawValue>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Declared type of a column
    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        let cells = self.column(name)?;
        Some(column_type_of(cells.into_iter()))
    }

    /// Keep only rows matching the predicate
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[RawValue]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    /// Row as a column → value map
    pub fn record(&self, index: usize) -> Option<BTreeMap<String, RawValue>> {
        let row = self.rows.get(index)?;
        Some(
            self.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect(),
        )
    }

    /// First `limit` rows as records
    pub fn sample(&self, limit: usize) -> Vec<BTreeMap<String, RawValue>> {
        (0..self.rows.len().min(limit))
            .filter_map(|i| self.record(i))
            .collect()
    }

    /// Number of distinct non-missing labels in a column
    pub fn distinct_count(&self, name: &str) -> usize {
        self.column(name)
            .map(|cells| {
                cells
                    .into_iter()
                    .filter(|v| !v.is_missing())
                    .map(RawValue::label)
                    .collect::<HashSet<_>>()
                    .len()
            })
            .unwrap_or(0)
    }
}

/// Decide the declared type of a sequence of cells
pub fn column_type_of<'a, I>(cells: I) -> ColumnType
where
    I: IntoIterator<Item = &'a RawValue>,
{
    let mut seen_number = false;
    for cell in cells {
        match cell {
            RawValue::Text(_) => return ColumnType::Textual,
            RawValue::Number(_) => seen_number = true,
            RawValue::Missing => {}
        }
    }
    if seen_number {
        ColumnType::Numeric
    } else {
        ColumnType::Empty
    }
}
