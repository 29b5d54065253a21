//! Target Column Encoding

use crate::task::{TaskDescriptor, TaskKind};
use dataset::RawValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// How class indices map back to original target labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetClasses {
    /// Regression target, no classes
    None,
    /// Textual target, classes sorted lexicographically
    Labels(Vec<String>),
    /// Numeric target, classes sorted ascending
    Values(Vec<f64>),
}

impl TargetClasses {
    /// Number of classes (0 for regression)
    pub fn len(&self) -> usize {
        match self {
            TargetClasses::None => 0,
            TargetClasses::Labels(l) => l.len(),
            TargetClasses::Values(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display label of a class index
    pub fn label(&self, index: usize) -> Option<String> {
        match self {
            TargetClasses::None => None,
            TargetClasses::Labels(l) => l.get(index).cloned(),
            TargetClasses::Values(v) => v.get(index).map(|x| x.to_string()),
        }
    }
}

/// Target vector ready for training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedTarget {
    /// Class indices (classification) or numeric values (regression)
    pub values: Vec<f64>,
    /// Index → label mapping
    pub classes: TargetClasses,
}

impl EncodedTarget {
    /// Encode target cells for the inferred task
    pub fn fit<'a, I>(cells: I, task: &TaskDescriptor) -> Self
    where
        I: IntoIterator<Item = &'a RawValue>,
    {
        let cells: Vec<&RawValue> = cells.into_iter().collect();

        if task.kind == TaskKind::Regression {
            let mut unparseable = 0usize;
            let values = cells
                .iter()
                .map(|c| {
                    c.as_number().unwrap_or_else(|| {
                        unparseable += 1;
                        0.0
                    })
                })
                .collect();
            if unparseable > 0 {
                warn!("{} regression target values were not numeric and were set to 0", unparseable);
            }
            return Self {
                values,
                classes: TargetClasses::None,
            };
        }

        if task.textual {
            let labels: Vec<String> = cells
                .iter()
                .map(|c| c.label())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let index: HashMap<&str, usize> = labels
                .iter()
                .enumerate()
                .map(|(i, l)| (l.as_str(), i))
                .collect();
            let values = cells
                .iter()
                .map(|c| index.get(c.label().as_str()).copied().unwrap_or(0) as f64)
                .collect();
            return Self {
                values,
                classes: TargetClasses::Labels(labels),
            };
        }

        let mut class_values: Vec<f64> = cells.iter().filter_map(|c| c.as_number()).collect();
        class_values.sort_by(|a, b| a.total_cmp(b));
        class_values.dedup();
        let values = cells
            .iter()
            .map(|c| {
                c.as_number()
                    .and_then(|x| class_values.binary_search_by(|p| p.total_cmp(&x)).ok())
                    .unwrap_or(0) as f64
            })
            .collect();

        Self {
            values,
            classes: TargetClasses::Values(class_values),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of classes (0 for regression)
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskInferencer;

    #[test]
    fn test_textual_classes_sorted() {
        let cells: Vec<RawValue> = ["Yes", "No", "Yes", "Maybe"]
            .iter()
            .map(|s| RawValue::from_cell(s))
            .collect();
        let task = TaskInferencer::infer(&cells).unwrap();
        let target = EncodedTarget::fit(&cells, &task);
        assert_eq!(
            target.classes,
            TargetClasses::Labels(vec!["Maybe".into(), "No".into(), "Yes".into()])
        );
        assert_eq!(target.values, vec![2.0, 1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_numeric_classes_become_indices() {
        let cells: Vec<RawValue> = [3.0, 1.0, 2.0, 3.0].iter().map(|v| RawValue::Number(*v)).collect();
        let task = TaskInferencer::infer(&cells).unwrap();
        let target = EncodedTarget::fit(&cells, &task);
        assert_eq!(target.classes, TargetClasses::Values(vec![1.0, 2.0, 3.0]));
        assert_eq!(target.values, vec![2.0, 0.0, 1.0, 2.0]);
        assert_eq!(target.classes.label(2).as_deref(), Some("3"));
    }

    #[test]
    fn test_binary_zero_one_is_identity() {
        let cells: Vec<RawValue> = [0.0, 1.0, 1.0, 0.0].iter().map(|v| RawValue::Number(*v)).collect();
        let task = TaskInferencer::infer(&cells).unwrap();
        let target = EncodedTarget::fit(&cells, &task);
        assert_eq!(target.values, vec![0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_regression_values() {
        let cells: Vec<RawValue> = (0..30).map(|i| RawValue::Number(i as f64 * 1.5)).collect();
        let task = TaskInferencer::infer(&cells).unwrap();
        let target = EncodedTarget::fit(&cells, &task);
        assert_eq!(target.n_classes(), 0);
        assert_eq!(target.values[4], 6.0);
    }
}
