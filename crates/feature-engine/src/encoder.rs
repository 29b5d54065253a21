//! Feature Matrix Assembly and Categorical Encoding

use crate::error::FeatureError;
use dataset::{column_type_of, ColumnType, Dataset, RawValue};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// How a feature column is turned into a number
///
/// Decided once at fit time and never re-inferred at prediction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Parsed as a number, missing or unparseable values become 0
    Numeric,
    /// Index into a frozen vocabulary, unseen values become 0
    Categorical { classes: Vec<String> },
}

/// Encoding of one feature column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnDescriptor {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Numeric,
        }
    }

    pub fn categorical(name: impl Into<String>, classes: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Categorical { classes },
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, ColumnKind::Categorical { .. })
    }

    /// Vocabulary of a categorical column
    pub fn classes(&self) -> Option<&[String]> {
        match &self.kind {
            ColumnKind::Categorical { classes } => Some(classes),
            ColumnKind::Numeric => None,
        }
    }

    /// Encode a single value, reporting any default that was taken
    pub fn encode(&self, value: Option<&RawValue>) -> (f64, Option<FallbackReason>) {
        match &self.kind {
            ColumnKind::Numeric => match value {
                None | Some(RawValue::Missing) => (0.0, Some(FallbackReason::MissingValue)),
                Some(v) => match v.as_number() {
                    Some(x) => (x, None),
                    None => (
                        0.0,
                        Some(FallbackReason::UnparseableNumber { value: v.label() }),
                    ),
                },
            },
            ColumnKind::Categorical { classes } => {
                let label = value.map(RawValue::label).unwrap_or_default();
                match classes.iter().position(|c| *c == label) {
                    Some(idx) => (idx as f64, None),
                    None if value.map_or(true, RawValue::is_missing) => {
                        (0.0, Some(FallbackReason::MissingValue))
                    }
                    None => (0.0, Some(FallbackReason::UnseenCategory { value: label })),
                }
            }
        }
    }
}

/// Why a default was used while encoding a value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FallbackReason {
    /// Categorical value absent from the fitted vocabulary, mapped to index 0
    UnseenCategory { value: String },
    /// Numeric column received text that does not parse, mapped to 0
    UnparseableNumber { value: String },
    /// Column absent from the row or empty, mapped to 0
    MissingValue,
}

/// Non-fatal record of a default taken at prediction time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingFallback {
    pub column: String,
    #[serde(flatten)]
    pub reason: FallbackReason,
}

/// Encoded row plus the fallbacks taken to build it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedRow {
    /// Values in feature order
    pub values: Vec<f64>,
    /// Defaults taken while encoding
    pub fallbacks: Vec<EncodingFallback>,
}

/// Ordered per-column encoding, reusable at prediction time
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncodingTable {
    columns: Vec<ColumnDescriptor>,
}

impl EncodingTable {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    /// Rebuild a table from a feature order and the categorical encoders
    ///
    /// Columns without an encoder are numeric.
    pub fn from_parts(
        feature_order: &[String],
        encoders: &BTreeMap<String, ColumnDescriptor>,
    ) -> Self {
        let columns = feature_order
            .iter()
            .map(|name| match encoders.get(name) {
                Some(descriptor) => ColumnDescriptor {
                    name: name.clone(),
                    kind: descriptor.kind.clone(),
                },
                None => ColumnDescriptor::numeric(name.clone()),
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in matrix order
    pub fn feature_order(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn descriptor(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Categorical descriptors keyed by column name
    pub fn encoders(&self) -> BTreeMap<String, ColumnDescriptor> {
        self.columns
            .iter()
            .filter(|c| c.is_categorical())
            .map(|c| (c.name.clone(), c.clone()))
            .collect()
    }

    /// Drop columns not listed in `keep`, preserving order
    pub fn retain(&mut self, keep: &[String]) {
        self.columns.retain(|c| keep.contains(&c.name));
    }

    /// Encode a raw row into a vector in feature order
    ///
    /// Never fails: missing columns, unparseable numbers and unseen categories
    /// all default to 0 and are reported as fallbacks. Extra columns are ignored.
    pub fn apply(&self, row: &BTreeMap<String, RawValue>) -> EncodedRow {
        let mut values = Vec::with_capacity(self.columns.len());
        let mut fallbacks = Vec::new();

        for descriptor in &self.columns {
            let (value, fallback) = descriptor.encode(row.get(&descriptor.name));
            if let Some(reason) = fallback {
                warn!("Encoding fallback on column '{}': {:?}", descriptor.name, reason);
                fallbacks.push(EncodingFallback {
                    column: descriptor.name.clone(),
                    reason,
                });
            }
            values.push(value);
        }

        EncodedRow { values, fallbacks }
    }
}

/// Numeric feature matrix with named columns
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self, FeatureError> {
        if names.len() != values.ncols() {
            return Err(FeatureError::ShapeMismatch {
                expected: names.len(),
                actual: values.ncols(),
            });
        }
        Ok(Self { names, values })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// Keep only the named columns, in their current order
    pub fn select(&self, keep: &[String]) -> Self {
        let indices: Vec<usize> = self
            .names
            .iter()
            .enumerate()
            .filter(|(_, n)| keep.contains(n))
            .map(|(i, _)| i)
            .collect();
        Self {
            names: indices.iter().map(|&i| self.names[i].clone()).collect(),
            values: self.values.select(Axis(1), &indices),
        }
    }
}

/// Builds the feature matrix and encoding table from a dataset
pub struct FeatureEncoder;

impl FeatureEncoder {
    /// Fit encodings for `columns` and encode every row
    ///
    /// A column with any text cell is categorical with a first-seen vocabulary
    /// (missing cells contribute the empty label). Other columns are numeric with
    /// missing cells set to 0. No row is dropped.
    pub fn fit(
        dataset: &Dataset,
        columns: &[String],
    ) -> Result<(FeatureMatrix, EncodingTable), FeatureError> {
        if columns.is_empty() {
            return Err(FeatureError::InsufficientData(
                "no feature columns to encode".to_string(),
            ));
        }

        let n_rows = dataset.row_count();
        let mut matrix = Array2::<f64>::zeros((n_rows, columns.len()));
        let mut descriptors = Vec::with_capacity(columns.len());

        for (j, name) in columns.iter().enumerate() {
            let cells = dataset
                .column(name)
                .ok_or_else(|| FeatureError::UnknownColumn(name.clone()))?;

            let descriptor = if column_type_of(cells.iter().copied()) == ColumnType::Textual {
                let mut classes: Vec<String> = Vec::new();
                let mut index: HashMap<String, usize> = HashMap::new();
                for (i, cell) in cells.iter().enumerate() {
                    let label = cell.label();
                    let idx = match index.get(&label) {
                        Some(&idx) => idx,
                        None => {
                            let idx = classes.len();
                            index.insert(label.clone(), idx);
                            classes.push(label);
                            idx
                        }
                    };
                    matrix[[i, j]] = idx as f64;
                }
                debug!("Column '{}' encoded as categorical with {} classes", name, classes.len());
                ColumnDescriptor::categorical(name.clone(), classes)
            } else {
                for (i, cell) in cells.iter().enumerate() {
                    matrix[[i, j]] = cell.as_number().unwrap_or(0.0);
                }
                ColumnDescriptor::numeric(name.clone())
            };
            descriptors.push(descriptor);
        }

        let matrix = FeatureMatrix::new(columns.to_vec(), matrix)?;
        Ok((matrix, EncodingTable::new(descriptors)))
    }
}
