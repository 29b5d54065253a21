//! Column Charts and Label Distributions

use dataset::RawValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Histogram bucket labels for percentage-like columns
pub const BUCKET_LABELS: [&str; 5] = ["0-20", "20-40", "40-60", "60-80", "80-100"];

/// Numeric values of a column, skipping missing and text cells
pub fn numeric_values<'a, I>(cells: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a RawValue>,
{
    cells.into_iter().filter_map(RawValue::as_number).collect()
}

/// Mean that returns 0 for an empty input
pub fn safe_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Five-bucket histogram over the 0..100 range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnChart {
    pub column: String,
    pub labels: Vec<String>,
    pub counts: Vec<usize>,
    pub mean: f64,
}

impl ColumnChart {
    /// Bucket values into half-open ranges of width 20
    ///
    /// Out-of-range numbers are clamped to the edge buckets.
    pub fn build(column: impl Into<String>, values: &[f64]) -> Self {
        let mut counts = vec![0usize; BUCKET_LABELS.len()];
        for &v in values {
            let bucket = if v < 20.0 {
                0
            } else if v < 40.0 {
                1
            } else if v < 60.0 {
                2
            } else if v < 80.0 {
                3
            } else {
                4
            };
            counts[bucket] += 1;
        }

        Self {
            column: column.into(),
            labels: BUCKET_LABELS.iter().map(|s| s.to_string()).collect(),
            counts,
            mean: safe_mean(values),
        }
    }
}

/// Per-class counts and ratios of a classification target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelDistribution {
    pub counts: BTreeMap<String, usize>,
    /// Share of each label, rounded to 4 decimals
    pub ratios: BTreeMap<String, f64>,
}

impl LabelDistribution {
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for label in labels {
            *counts.entry(label.into()).or_insert(0) += 1;
        }

        let total: usize = counts.values().sum();
        let ratios = counts
            .iter()
            .map(|(k, &c)| {
                let ratio = if total == 0 { 0.0 } else { c as f64 / total as f64 };
                (k.clone(), (ratio * 10_000.0).round() / 10_000.0)
            })
            .collect();

        Self { counts, ratios }
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_mean() {
        assert_eq!(safe_mean(&[]), 0.0);
        assert_eq!(safe_mean(&[2.0, 4.0]), 3.0);
    }

    #[test]
    fn test_numeric_values_skip_text() {
        let cells = vec![RawValue::Number(1.0), RawValue::from_cell("x"), RawValue::Missing];
        assert_eq!(numeric_values(&cells), vec![1.0]);
    }

    #[test]
    fn test_chart_buckets() {
        let chart = ColumnChart::build("Score", &[0.0, 19.9, 20.0, 55.0, 80.0, 99.0, 150.0, -3.0]);
        assert_eq!(chart.labels, BUCKET_LABELS.to_vec());
        assert_eq!(chart.counts, vec![3, 1, 1, 0, 3]);
    }

    #[test]
    fn test_label_ratios_rounded() {
        let dist = LabelDistribution::from_labels(["Yes", "No", "No"]);
        assert_eq!(dist.counts["No"], 2);
        assert_eq!(dist.ratios["No"], 0.6667);
        assert_eq!(dist.ratios["Yes"], 0.3333);
        assert_eq!(dist.total(), 3);
    }
}
