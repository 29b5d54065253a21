//! Prediction Task Inference

use crate::error::FeatureError;
use dataset::{column_type_of, ColumnType, RawValue};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Largest number of distinct numeric target values still treated as classes
pub const MAX_CLASSIFICATION_CARDINALITY: usize = 20;

/// Prediction task decided from the target column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Regression,
    BinaryClassification,
    MulticlassClassification,
}

impl TaskKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Regression => "regression",
            TaskKind::BinaryClassification => "binary_classification",
            TaskKind::MulticlassClassification => "multiclass_classification",
        }
    }

    pub fn is_classification(&self) -> bool {
        !matches!(self, TaskKind::Regression)
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, TaskKind::BinaryClassification)
    }
}

/// Result of task inference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Decided task
    pub kind: TaskKind,
    /// Number of distinct non-missing target labels
    pub distinct_values: usize,
    /// Whether the target column is textual
    pub textual: bool,
}

/// Decides the task type from target values
pub struct TaskInferencer;

impl TaskInferencer {
    /// Infer the task for a target column
    ///
    /// Fewer than two distinct values is rejected. Textual columns, and numeric
    /// columns with at most [`MAX_CLASSIFICATION_CARDINALITY`] distinct values,
    /// are classification; binary when exactly two values occur.
    pub fn infer<'a, I>(values: I) -> Result<TaskDescriptor, FeatureError>
    where
        I: IntoIterator<Item = &'a RawValue>,
        I::IntoIter: Clone,
    {
        let values = values.into_iter();
        let textual = column_type_of(values.clone()) == ColumnType::Textual;
        let distinct: HashSet<String> = values
            .filter(|v| !v.is_missing())
            .map(RawValue::label)
            .collect();
        let u = distinct.len();

        if u < 2 {
            return Err(FeatureError::InvalidTarget(format!(
                "target needs at least 2 distinct values, found {}",
                u
            )));
        }

        let kind = if textual || u <= MAX_CLASSIFICATION_CARDINALITY {
            if u == 2 {
                TaskKind::BinaryClassification
            } else {
                TaskKind::MulticlassClassification
            }
        } else {
            TaskKind::Regression
        };

        debug!("Inferred task {} from {} distinct values (textual={})", kind.as_str(), u, textual);

        Ok(TaskDescriptor {
            kind,
            distinct_values: u,
            textual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn numbers(values: &[f64]) -> Vec<RawValue> {
        values.iter().map(|v| RawValue::Number(*v)).collect()
    }

    #[test]
    fn test_constant_target_rejected() {
        let col = numbers(&[1.0, 1.0, 1.0]);
        assert!(matches!(
            TaskInferencer::infer(&col),
            Err(FeatureError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_missing_values_do_not_count() {
        let col = vec![RawValue::Number(1.0), RawValue::Missing, RawValue::Number(1.0)];
        assert!(TaskInferencer::infer(&col).is_err());
    }

    #[test]
    fn test_textual_high_cardinality_is_classification() {
        let col: Vec<RawValue> = (0..50).map(|i| RawValue::Text(format!("name-{}", i))).collect();
        let task = TaskInferencer::infer(&col).unwrap();
        assert_eq!(task.kind, TaskKind::MulticlassClassification);
        assert!(task.textual);
    }

    #[test]
    fn test_same_number_different_spelling() {
        let col = vec![RawValue::Number(1.0), RawValue::from_cell("1.0"), RawValue::Number(0.0)];
        let task = TaskInferencer::infer(&col).unwrap();
        assert_eq!(task.kind, TaskKind::BinaryClassification);
    }

    proptest! {
        #[test]
        fn prop_two_values_is_binary(a in -1000i64..1000, delta in 1i64..1000, n in 2usize..200) {
            let col: Vec<RawValue> = (0..n)
                .map(|i| RawValue::Number(if i % 2 == 0 { a as f64 } else { (a + delta) as f64 }))
                .collect();
            let task = TaskInferencer::infer(&col).unwrap();
            prop_assert_eq!(task.kind, TaskKind::BinaryClassification);
        }

        #[test]
        fn prop_three_to_twenty_is_multiclass(u in 3usize..=20, repeats in 1usize..5) {
            let col: Vec<RawValue> = (0..u * repeats)
                .map(|i| RawValue::Number((i % u) as f64))
                .collect();
            let task = TaskInferencer::infer(&col).unwrap();
            prop_assert_eq!(task.kind, TaskKind::MulticlassClassification);
            prop_assert_eq!(task.distinct_values, u);
        }

        #[test]
        fn prop_twenty_one_plus_numeric_is_regression(u in 21usize..300, offset in -50.0f64..50.0) {
            let col: Vec<RawValue> = (0..u)
                .map(|i| RawValue::Number(offset + i as f64 * 0.5))
                .collect();
            let task = TaskInferencer::infer(&col).unwrap();
            prop_assert_eq!(task.kind, TaskKind::Regression);
        }
    }
}
