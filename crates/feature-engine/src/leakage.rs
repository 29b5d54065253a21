//! Target Leakage Guard

use crate::encoder::{ColumnKind, EncodingTable, FeatureMatrix};
use crate::target::{EncodedTarget, TargetClasses};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Columns kept and dropped by the leakage guard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakageReport {
    pub kept: Vec<String>,
    pub dropped: Vec<String>,
}

/// Removes features that restate the target
pub struct LeakageGuard;

impl LeakageGuard {
    /// Return the columns that do not trivially reconstruct the target
    ///
    /// Numeric columns are compared with the target in its own units: the
    /// original class values of a numeric target, the class indices of a
    /// textual one. They are also dropped when they equal `1 - y` for a 0/1
    /// target. Categorical columns are compared label by label with the target
    /// labels, so vocabulary order does not matter. Only meaningful for
    /// classification.
    pub fn strip(
        matrix: &FeatureMatrix,
        table: &EncodingTable,
        target: &EncodedTarget,
    ) -> LeakageReport {
        let mut report = LeakageReport::default();
        let values = matrix.values();
        if values.nrows() != target.len() || target.is_empty() {
            report.kept = matrix.names().to_vec();
            return report;
        }

        let reference = Self::reference_values(target);
        let labels: Vec<Option<String>> = target
            .values
            .iter()
            .map(|&idx| target.classes.label(idx as usize))
            .collect();
        let binary = reference.iter().all(|&y| y == 0.0 || y == 1.0);

        for (j, name) in matrix.names().iter().enumerate() {
            let column = values.column(j);
            let verdict = match table.descriptor(name).map(|d| &d.kind) {
                Some(ColumnKind::Categorical { classes }) => column
                    .iter()
                    .zip(&labels)
                    .all(|(x, label)| {
                        label.as_deref().is_some_and(|l| {
                            classes.get(*x as usize).is_some_and(|c| c == l)
                        })
                    })
                    .then_some("duplicates"),
                _ => {
                    if column.iter().zip(&reference).all(|(x, y)| x == y) {
                        Some("duplicates")
                    } else if binary && column.iter().zip(&reference).all(|(x, y)| *x == 1.0 - y) {
                        Some("inverts")
                    } else {
                        None
                    }
                }
            };

            match verdict {
                Some(how) => {
                    warn!("Dropping feature '{}': it {} the target", name, how);
                    report.dropped.push(name.clone());
                }
                None => report.kept.push(name.clone()),
            }
        }

        report
    }

    /// Target per row in the units a numeric feature would carry
    fn reference_values(target: &EncodedTarget) -> Vec<f64> {
        match &target.classes {
            TargetClasses::Values(class_values) => target
                .values
                .iter()
                .map(|&idx| class_values.get(idx as usize).copied().unwrap_or(f64::NAN))
                .collect(),
            TargetClasses::Labels(_) | TargetClasses::None => target.values.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{ColumnDescriptor, FeatureEncoder};
    use crate::task::TaskInferencer;
    use dataset::{Dataset, TableNormalizer};
    use ndarray::array;

    fn numeric_table(names: &[&str]) -> EncodingTable {
        EncodingTable::new(names.iter().map(|n| ColumnDescriptor::numeric(*n)).collect())
    }

    fn matrix(names: &[&str], values: ndarray::Array2<f64>) -> FeatureMatrix {
        FeatureMatrix::new(names.iter().map(|n| n.to_string()).collect(), values).unwrap()
    }

    fn numeric_target(values: &[f64]) -> EncodedTarget {
        let cells: Vec<dataset::RawValue> =
            values.iter().map(|v| dataset::RawValue::Number(*v)).collect();
        let task = TaskInferencer::infer(&cells).unwrap();
        EncodedTarget::fit(&cells, &task)
    }

    /// Encode every column but the last and strip against the last
    fn strip_dataset(ds: &Dataset) -> LeakageReport {
        let mut columns = ds.columns().to_vec();
        let target_name = columns.pop().unwrap();
        let cells = ds.column(&target_name).unwrap();
        let task = TaskInferencer::infer(cells.iter().copied()).unwrap();
        let target = EncodedTarget::fit(cells.iter().copied(), &task);
        let (matrix, table) = FeatureEncoder::fit(ds, &columns).unwrap();
        LeakageGuard::strip(&matrix, &table, &target)
    }

    #[test]
    fn test_identical_and_complement_dropped() {
        let names = ["leak", "honest", "inverse"];
        let x = array![[1.0, 5.0, 0.0], [0.0, 3.0, 1.0], [1.0, 2.0, 0.0], [0.0, 2.0, 1.0]];
        let target = numeric_target(&[1.0, 0.0, 1.0, 0.0]);
        let report = LeakageGuard::strip(&matrix(&names, x), &numeric_table(&names), &target);
        assert_eq!(report.dropped, vec!["leak", "inverse"]);
        assert_eq!(report.kept, vec!["honest"]);
    }

    #[test]
    fn test_complement_only_for_zero_one_targets() {
        let names = ["a", "b", "c"];
        let x = array![[-2.0, 0.0, -1.0], [-1.0, 1.0, 0.0], [0.0, 2.0, 1.0]];
        let target = numeric_target(&[3.0, 2.0, 1.0]);
        let report = LeakageGuard::strip(&matrix(&names, x), &numeric_table(&names), &target);
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn test_numeric_copy_of_one_two_target() {
        let rows = (0..40)
            .map(|i| {
                let y = 1 + i % 2;
                vec![format!("{}", (i * 5) % 11), y.to_string(), y.to_string()]
            })
            .collect::<Vec<_>>();
        let ds = TableNormalizer::new().normalize(["Noise", "Copy", "Target"], rows);
        let report = strip_dataset(&ds);
        assert_eq!(report.dropped, vec!["Copy"]);
        assert_eq!(report.kept, vec!["Noise"]);
    }

    #[test]
    fn test_textual_copy_with_different_vocabulary_order() {
        let rows = (0..60)
            .map(|i| {
                let grade = ["C", "A", "B"][i % 3];
                vec![format!("{}", (i * 7) % 13), grade.to_string(), grade.to_string()]
            })
            .collect::<Vec<_>>();
        let ds = TableNormalizer::new().normalize(["Noise", "Copy", "Grade"], rows);
        let report = strip_dataset(&ds);
        assert_eq!(report.dropped, vec!["Copy"]);
    }

    #[test]
    fn test_partial_label_overlap_kept() {
        let rows = vec![
            vec!["A".to_string(), "A".to_string()],
            vec!["B".to_string(), "B".to_string()],
            vec!["A".to_string(), "B".to_string()],
        ];
        let ds = TableNormalizer::new().normalize(["Guess", "Label"], rows);
        let report = strip_dataset(&ds);
        assert!(report.dropped.is_empty());
        assert_eq!(report.kept, vec!["Guess"]);
    }

    #[test]
    fn test_textual_binary_index_copy_dropped() {
        let rows = (0..20)
            .map(|i| {
                let passed = if i % 3 == 0 { "Yes" } else { "No" };
                let flag = if passed == "Yes" { "1" } else { "0" };
                vec![flag.to_string(), passed.to_string()]
            })
            .collect::<Vec<_>>();
        let ds = TableNormalizer::new().normalize(["Flag", "Passed"], rows);
        let report = strip_dataset(&ds);
        assert_eq!(report.dropped, vec!["Flag"]);
    }
}
