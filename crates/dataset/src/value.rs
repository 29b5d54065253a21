//! Raw Cell Values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cell texts treated as missing, in addition to the empty string
const NA_MARKERS: [&str; 11] = [
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "null", "NULL", "None", "#N/A", "<NA>",
];

/// A single cell as read from an upload or a prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Finite numeric value
    Number(f64),
    /// Anything that did not parse as a number
    Text(String),
    /// Empty cell or NA marker
    Missing,
}

impl RawValue {
    /// Classify raw cell text
    pub fn from_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() || NA_MARKERS.contains(&trimmed) {
            return RawValue::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => RawValue::Number(v),
            _ => RawValue::Text(trimmed.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawValue::Missing)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, RawValue::Text(_))
    }

    /// Numeric view of the value; text is parsed leniently
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(v) => Some(*v),
            RawValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            RawValue::Missing => None,
        }
    }

    /// Canonical label used as a categorical key
    ///
    /// Numbers render in their shortest form so `5.0` and `5` share a label.
    pub fn label(&self) -> String {
        match self {
            RawValue::Number(v) => v.to_string(),
            RawValue::Text(s) => s.clone(),
            RawValue::Missing => String::new(),
        }
    }
}

impl Default for RawValue {
    fn default() -> Self {
        RawValue::Missing
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            RawValue::Number(value)
        } else {
            RawValue::Missing
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::from_cell(value)
    }
}

impl From<Option<f64>> for RawValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(RawValue::Missing, RawValue::from)
    }
}
