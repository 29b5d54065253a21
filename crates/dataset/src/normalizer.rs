//! Table Normalization

use crate::table::Dataset;
use crate::value::RawValue;
use std::collections::HashSet;
use tracing::debug;

/// Normalizes raw headers and cell text into a [`Dataset`]
///
/// Column names are trimmed and made unique, cells are classified, and rows
/// with no present cell are dropped. No column is ever removed here.
#[derive(Debug, Clone, Default)]
pub struct TableNormalizer {
    /// Drop rows where every cell is missing
    drop_empty_rows: bool,
}

impl TableNormalizer {
    /// Create a normalizer with the default policy
    pub fn new() -> Self {
        Self {
            drop_empty_rows: true,
        }
    }

    /// Keep fully empty rows (used when row positions must be preserved)
    pub fn keep_empty_rows(mut self) -> Self {
        self.drop_empty_rows = false;
        self
    }

    /// Normalize headers and rows of cell text
    pub fn normalize<H, R, C>(&self, headers: H, rows: R) -> Dataset
    where
        H: IntoIterator,
        H::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: IntoIterator<Item = C>,
        C: AsRef<str>,
    {
        let columns = unique_names(headers.into_iter().map(|h| h.as_ref().trim().to_string()));

        let mut dropped = 0usize;
        let rows: Vec<Vec<RawValue>> = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| RawValue::from_cell(cell.as_ref()))
                    .collect::<Vec<_>>()
            })
            .filter(|row| {
                let keep = !self.drop_empty_rows || row.iter().any(|v| !v.is_missing());
                if !keep {
                    dropped += 1;
                }
                keep
            })
            .collect();

        debug!(
            "Normalized table: {} columns, {} rows ({} empty rows dropped)",
            columns.len(),
            rows.len(),
            dropped
        );

        Dataset::new(columns, rows)
    }
}

/// Make column names unique by suffixing repeats with `.1`, `.2`, ...
fn unique_names<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for name in names {
        let mut candidate = name.clone();
        let mut suffix = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}.{}", name, suffix);
            suffix += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}
