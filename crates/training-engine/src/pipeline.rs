//! End-to-end training pipeline: dataset in, artifact out

use crate::artifact::{ModelArtifact, ModelParameters};
use crate::config::EngineConfig;
use crate::error::TrainingError;
use crate::trainer::{FittedModel, FoldReport, ModelKind, ModelPreference, Trainer};
use chrono::Utc;
use dataset::{Dataset, RawValue, Validator};
use feature_engine::{
    EncodedTarget, FeatureEncoder, ImbalanceWeighter, LabelDistribution, LeakageGuard,
    TargetClasses, TaskInferencer, TaskKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// What to train
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    /// Target column; the last column when absent or unknown
    pub target: Option<String>,
    pub model: ModelPreference,
    pub owner: Option<String>,
}

/// Report returned to the caller after training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub model_id: Uuid,
    pub model_kind: ModelKind,
    pub task: TaskKind,
    pub target_name: String,
    pub feature_order: Vec<String>,
    pub rows_used: usize,
    pub rows_dropped: usize,
    pub label_counts: Option<BTreeMap<String, usize>>,
    pub label_ratio: Option<BTreeMap<String, f64>>,
    pub validation_score: Option<f64>,
    pub fold_scores: Vec<Option<f64>>,
    pub folds: Vec<FoldReport>,
    pub target_classes: Option<Vec<String>>,
    pub class_values: Option<Vec<f64>>,
    pub encoder_classes: BTreeMap<String, Vec<String>>,
    pub dropped_features: Vec<String>,
    pub weighted_by: Option<String>,
    pub training_ms: u64,
}

/// Artifact plus its summary
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub summary: TrainingSummary,
}

/// Runs target selection, encoding, leakage stripping, weighting and training
pub struct TrainingPipeline {
    trainer: Trainer,
    validator: Validator,
}

impl TrainingPipeline {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            trainer: Trainer::new(config),
            validator: Validator::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.trainer.config()
    }

    /// Train a model on `dataset`
    ///
    /// Structural problems (too few columns, constant target, no usable
    /// features) are reported before any model is fit.
    pub fn run(
        &self,
        mut dataset: Dataset,
        request: &TrainingRequest,
    ) -> Result<TrainingOutcome, TrainingError> {
        let started = Instant::now();
        let selection = self
            .validator
            .select_target(&mut dataset, request.target.as_deref())?;
        let target_name = selection.target.clone();

        let target_cells: Vec<&RawValue> = dataset
            .column(&target_name)
            .ok_or_else(|| TrainingError::InvalidTarget(target_name.clone()))?;
        let task = TaskInferencer::infer(target_cells.iter().copied())?;
        let target = EncodedTarget::fit(target_cells.iter().copied(), &task);

        let (mut matrix, mut table) = FeatureEncoder::fit(&dataset, &selection.feature_columns)?;

        let grouping = &self.config().grouping_column;
        let groups: Option<Vec<String>> = if task.kind.is_classification()
            && table.descriptor(grouping).is_some()
        {
            dataset.column(grouping).map(|cells| {
                cells
                    .iter()
                    .map(|c| ImbalanceWeighter::normalize_group(&c.label()))
                    .collect()
            })
        } else {
            None
        };

        let mut dropped_features = Vec::new();
        if task.kind.is_classification() {
            let report = LeakageGuard::strip(&matrix, &table, &target);
            if !report.dropped.is_empty() {
                matrix = matrix.select(&report.kept);
                table.retain(&report.kept);
                dropped_features = report.dropped;
            }
        }
        if table.is_empty() {
            return Err(TrainingError::InsufficientData(
                "no usable feature columns remain after removing target leaks".to_string(),
            ));
        }

        let weights = groups
            .map(|groups| ImbalanceWeighter::compute_weights(&target.values, &groups))
            .transpose()?;
        let weighted_by = weights.as_ref().map(|_| grouping.clone());

        let trained = self.trainer.train(
            matrix.values(),
            &target.values,
            task.kind,
            target.n_classes(),
            weights.as_deref(),
            request.model,
        )?;

        let parameters = match &trained.model {
            FittedModel::Linear(m) => ModelParameters::Linear {
                coefficients: m.coefficients.clone(),
                intercept: m.intercept,
            },
            FittedModel::Logistic(m) => ModelParameters::Linear {
                coefficients: m.coefficients.clone(),
                intercept: m.intercept,
            },
            FittedModel::Forest(forest) => ModelParameters::Ensemble {
                blob: forest.to_bytes()?,
            },
        };

        let (target_classes, class_values) = match &target.classes {
            TargetClasses::None => (None, None),
            TargetClasses::Labels(labels) => (Some(labels.clone()), None),
            TargetClasses::Values(values) => (None, Some(values.clone())),
        };

        let artifact = ModelArtifact {
            id: Uuid::new_v4(),
            task: task.kind,
            model_kind: trained.kind,
            feature_order: table.feature_order(),
            encoders: table.encoders(),
            target_name: target_name.clone(),
            target_classes,
            class_values,
            parameters,
            validation_score: trained.validation_score,
            is_binary: task.kind.is_binary(),
            rows_used: trained.rows_used,
            owner: request.owner.clone(),
            created_at: Utc::now(),
        };
        artifact.validate()?;

        let distribution = task
            .kind
            .is_classification()
            .then(|| LabelDistribution::from_labels(target_cells.iter().map(|c| c.label())));
        if let Some(dist) = &distribution {
            if let Some(min) = dist.ratios.values().copied().reduce(f64::min) {
                if min < 0.1 {
                    warn!("Target '{}' is imbalanced: smallest class ratio {:.4}", target_name, min);
                }
            }
        }

        let summary = TrainingSummary {
            model_id: artifact.id,
            model_kind: artifact.model_kind,
            task: artifact.task,
            target_name,
            feature_order: artifact.feature_order.clone(),
            rows_used: artifact.rows_used,
            rows_dropped: selection.rows_dropped,
            label_counts: distribution.as_ref().map(|d| d.counts.clone()),
            label_ratio: distribution.map(|d| d.ratios),
            validation_score: artifact.validation_score,
            fold_scores: trained.folds.iter().map(|f| f.score).collect(),
            folds: trained.folds,
            target_classes: artifact.target_classes.clone(),
            class_values: artifact.class_values.clone(),
            encoder_classes: artifact.encoder_classes(),
            dropped_features,
            weighted_by,
            training_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "Model {} ({}) trained for target '{}' in {} ms",
            artifact.id,
            artifact.model_kind.as_str(),
            summary.target_name,
            summary.training_ms
        );

        Ok(TrainingOutcome { artifact, summary })
    }
}

impl Default for TrainingPipeline {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataset::TableNormalizer;

    fn fast_pipeline() -> TrainingPipeline {
        TrainingPipeline::new(EngineConfig {
            n_estimators: 15,
            ..EngineConfig::default()
        })
    }

    fn table(headers: &[&str], rows: Vec<Vec<String>>) -> Dataset {
        TableNormalizer::new().normalize(headers.iter().copied(), rows)
    }

    fn leaky_rows() -> Vec<Vec<String>> {
        (0..40)
            .map(|i| {
                let y = (i % 2) as f64;
                vec![
                    format!("{}", (i * 7) % 13),
                    format!("{}", y),
                    format!("{}", 1.0 - y),
                    format!("{}", y),
                ]
            })
            .collect()
    }

    #[test]
    fn test_leaky_columns_are_removed() {
        let dataset = table(&["Noise", "Copy", "Flip", "Passed"], leaky_rows());
        let outcome = fast_pipeline().run(dataset, &TrainingRequest::default()).unwrap();
        assert_eq!(outcome.summary.dropped_features, vec!["Copy", "Flip"]);
        assert_eq!(outcome.artifact.feature_order, vec!["Noise"]);
        assert_eq!(outcome.artifact.task, TaskKind::BinaryClassification);
    }

    #[test]
    fn test_only_leaks_is_rejected() {
        let rows = leaky_rows().into_iter().map(|r| vec![r[1].clone(), r[3].clone()]).collect();
        let dataset = table(&["Copy", "Passed"], rows);
        let err = fast_pipeline().run(dataset, &TrainingRequest::default()).unwrap_err();
        assert!(matches!(err, TrainingError::InsufficientData(_)));
    }

    #[test]
    fn test_copy_of_one_two_target_removed() {
        let rows = (0..40)
            .map(|i| {
                let y = 1 + i % 2;
                vec![format!("{}", (i * 7) % 13), y.to_string(), y.to_string()]
            })
            .collect();
        let outcome = fast_pipeline()
            .run(table(&["Noise", "Copy", "Target"], rows), &TrainingRequest::default())
            .unwrap();
        assert_eq!(outcome.summary.dropped_features, vec!["Copy"]);
        assert_eq!(outcome.summary.class_values, Some(vec![1.0, 2.0]));
    }

    #[test]
    fn test_textual_multiclass_copy_removed() {
        let rows = (0..60)
            .map(|i| {
                let grade = ["C", "A", "B"][i % 3];
                vec![format!("{}", (i * 7) % 13), grade.to_string(), grade.to_string()]
            })
            .collect();
        let outcome = fast_pipeline()
            .run(table(&["Noise", "Copy", "Grade"], rows), &TrainingRequest::default())
            .unwrap();
        assert_eq!(outcome.summary.dropped_features, vec!["Copy"]);
        assert_eq!(outcome.artifact.feature_order, vec!["Noise"]);
    }

    #[test]
    fn test_grouping_survives_when_group_column_is_stripped() {
        let rows = (0..40)
            .map(|i| {
                let passed = if i % 4 == 0 { "Yes" } else { "No" };
                vec![format!("{}", (i * 7) % 13), passed.to_string(), passed.to_string()]
            })
            .collect();
        let dataset = table(&["Noise", "Access_to_Resources", "Passed"], rows);
        let outcome = fast_pipeline().run(dataset, &TrainingRequest::default()).unwrap();
        assert_eq!(outcome.summary.dropped_features, vec!["Access_to_Resources"]);
        assert_eq!(outcome.summary.weighted_by.as_deref(), Some("Access_to_Resources"));
        assert_eq!(outcome.artifact.feature_order, vec!["Noise"]);
    }

    #[test]
    fn test_constant_target_rejected() {
        let rows = (0..10).map(|i| vec![i.to_string(), "1".to_string()]).collect();
        let err = fast_pipeline()
            .run(table(&["x", "y"], rows), &TrainingRequest::default())
            .unwrap_err();
        assert!(matches!(err, TrainingError::Feature(_)));
    }

    #[test]
    fn test_textual_multiclass_with_grouping() {
        let rows = (0..60)
            .map(|i| {
                let grade = ["A", "B", "C"][i % 3];
                let access = if i % 4 == 0 { " low " } else { "HIGH" };
                vec![format!("{}", (i % 3) * 30 + i % 7), access.to_string(), grade.to_string()]
            })
            .collect();
        let dataset = table(&["Score", "Access_to_Resources", "Grade"], rows);
        let request = TrainingRequest {
            target: Some("Grade".into()),
            ..TrainingRequest::default()
        };
        let outcome = fast_pipeline().run(dataset, &request).unwrap();
        let summary = &outcome.summary;
        assert_eq!(summary.model_kind, ModelKind::RandomForest);
        assert_eq!(summary.task, TaskKind::MulticlassClassification);
        assert_eq!(summary.target_classes, Some(vec!["A".into(), "B".into(), "C".into()]));
        assert_eq!(summary.weighted_by.as_deref(), Some("Access_to_Resources"));
        assert_eq!(summary.label_counts.as_ref().unwrap()["A"], 20);
        assert_eq!(summary.label_ratio.as_ref().unwrap()["B"], 0.3333);
        assert_eq!(
            summary.encoder_classes["Access_to_Resources"],
            vec!["low".to_string(), "HIGH".to_string()]
        );
        assert!(matches!(outcome.artifact.parameters, ModelParameters::Ensemble { .. }));
    }

    #[test]
    fn test_regression_has_no_label_stats() {
        let rows = (0..50)
            .map(|i| vec![i.to_string(), ((i * 3) % 17).to_string(), (2 * i + 1).to_string()])
            .collect();
        let outcome = fast_pipeline()
            .run(table(&["a", "b", "score"], rows), &TrainingRequest::default())
            .unwrap();
        assert_eq!(outcome.summary.task, TaskKind::Regression);
        assert!(outcome.summary.label_counts.is_none());
        assert_eq!(outcome.summary.fold_scores.len(), 5);
        assert!(outcome.summary.validation_score.unwrap() > 0.99);
    }
}
