//! Cross-validated model training

use crate::config::EngineConfig;
use crate::cross_validation::{CrossValidator, FoldSplit};
use crate::deadline::Deadline;
use crate::error::TrainingError;
use crate::forest::{ForestParams, RandomForest};
use crate::linear::LinearRegression;
use crate::logistic::LogisticRegression;
use crate::metrics::{balanced_accuracy, r2_score};
use feature_engine::TaskKind;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Model family stored in an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LinearRegression,
    LogisticRegression,
    RandomForest,
}

impl ModelKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "linear_regression",
            ModelKind::LogisticRegression => "logistic_regression",
            ModelKind::RandomForest => "random_forest",
        }
    }
}

/// Caller's model choice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPreference {
    /// Pick the model from the task
    #[default]
    Auto,
    /// Use a random forest for classification
    RandomForest,
}

impl ModelPreference {
    /// Parse the request's `model` field; only `rf` selects the forest
    pub fn from_request(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "rf" => ModelPreference::RandomForest,
            _ => ModelPreference::Auto,
        }
    }

    /// Model used for a task under this preference
    pub fn resolve(self, task: TaskKind) -> ModelKind {
        match (task, self) {
            (TaskKind::Regression, _) => ModelKind::LinearRegression,
            (TaskKind::BinaryClassification, ModelPreference::Auto) => ModelKind::LogisticRegression,
            (TaskKind::BinaryClassification, ModelPreference::RandomForest)
            | (TaskKind::MulticlassClassification, _) => ModelKind::RandomForest,
        }
    }
}

/// A fitted model of any supported family
#[derive(Debug, Clone, PartialEq)]
pub enum FittedModel {
    Linear(LinearRegression),
    Logistic(LogisticRegression),
    Forest(RandomForest),
}

impl FittedModel {
    /// Regression values or class indices per row
    pub fn predict(&self, x: &Array2<f64>) -> Vec<f64> {
        match self {
            FittedModel::Linear(m) => m.predict(x),
            FittedModel::Logistic(m) => m.predict(x),
            FittedModel::Forest(m) => m.predict(x),
        }
    }

    /// Coefficients of linear families
    pub fn coefficients(&self) -> Option<&[f64]> {
        match self {
            FittedModel::Linear(m) => Some(&m.coefficients),
            FittedModel::Logistic(m) => Some(&m.coefficients),
            FittedModel::Forest(_) => None,
        }
    }
}

/// Outcome of one cross-validation fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldReport {
    pub index: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    /// None when the fold's score is undefined
    pub score: Option<f64>,
    pub coefficients: Option<Vec<f64>>,
}

/// Final model refit on all rows plus its cross-validated score
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub kind: ModelKind,
    pub model: FittedModel,
    /// Mean of the defined fold scores
    pub validation_score: Option<f64>,
    pub folds: Vec<FoldReport>,
    pub rows_used: usize,
}

/// Trains and validates models according to [`EngineConfig`]
pub struct Trainer {
    config: EngineConfig,
}

impl Trainer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Cross-validate the chosen model, then refit it on every row
    ///
    /// `y` holds regression values or class indices `0..n_classes`.
    /// `weights` are optional per-row sample weights for classification.
    /// Both phases share one `cv_timeout_secs` budget.
    pub fn train(
        &self,
        x: &Array2<f64>,
        y: &[f64],
        task: TaskKind,
        n_classes: usize,
        weights: Option<&[f64]>,
        preference: ModelPreference,
    ) -> Result<TrainedModel, TrainingError> {
        let n = x.nrows();
        if y.len() != n {
            return Err(TrainingError::InsufficientData(format!(
                "{} feature rows but {} target values",
                n,
                y.len()
            )));
        }
        if let Some(w) = weights {
            if w.len() != n {
                return Err(TrainingError::InsufficientData(format!(
                    "{} feature rows but {} sample weights",
                    n,
                    w.len()
                )));
            }
        }
        if n < self.config.folds {
            return Err(TrainingError::InsufficientData(format!(
                "{} rows is fewer than {} cross-validation folds",
                n, self.config.folds
            )));
        }
        if task.is_classification() && n_classes < 2 {
            return Err(TrainingError::InvalidTarget(format!(
                "classification needs at least 2 classes, found {}",
                n_classes
            )));
        }

        let kind = preference.resolve(task);
        let deadline = Deadline::after(self.config.cv_timeout());
        let cv = CrossValidator::new(self.config.folds, self.config.seed);
        let splits = if task.is_classification() {
            cv.stratified_k_fold(y)
        } else {
            cv.k_fold(n)
        };

        info!(
            "Training {} for {} on {} rows × {} features",
            kind.as_str(),
            task.as_str(),
            n,
            x.ncols()
        );

        let folds = self.cross_validate(kind, task, x, y, n_classes, weights, &splits, deadline)?;

        let scores: Vec<f64> = folds.iter().filter_map(|f| f.score).collect();
        let validation_score = if scores.is_empty() {
            warn!("Every cross-validation fold was degenerate; no validation score");
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };

        let all_rows: Vec<usize> = (0..n).collect();
        let model = self.fit(kind, x, y, n_classes, weights, &all_rows, deadline)?;

        info!(
            "Trained {} on {} rows, validation score {:?}",
            kind.as_str(),
            n,
            validation_score
        );

        Ok(TrainedModel {
            kind,
            model,
            validation_score,
            folds,
            rows_used: n,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn cross_validate(
        &self,
        kind: ModelKind,
        task: TaskKind,
        x: &Array2<f64>,
        y: &[f64],
        n_classes: usize,
        weights: Option<&[f64]>,
        splits: &[FoldSplit],
        deadline: Deadline,
    ) -> Result<Vec<FoldReport>, TrainingError> {
        let mut reports = Vec::with_capacity(splits.len());

        for split in splits {
            if deadline.expired() {
                warn!(
                    "Cross-validation stopped after {} of {} folds",
                    reports.len(),
                    splits.len()
                );
                return Err(TrainingError::Timeout(self.config.cv_timeout_secs));
            }

            let mut report = FoldReport {
                index: split.index,
                train_rows: split.train.len(),
                test_rows: split.test.len(),
                score: None,
                coefficients: None,
            };

            if split.train.is_empty() || split.test.is_empty() {
                debug!("Fold {} is empty, skipping", split.index);
                reports.push(report);
                continue;
            }

            match self.fit(kind, x, y, n_classes, weights, &split.train, deadline) {
                Ok(model) => {
                    let x_test = x.select(Axis(0), &split.test);
                    let y_test: Vec<f64> = split.test.iter().map(|&i| y[i]).collect();
                    let predicted = model.predict(&x_test);
                    report.score = if task.is_classification() {
                        balanced_accuracy(&y_test, &predicted)
                    } else {
                        r2_score(&y_test, &predicted)
                    };
                    report.coefficients = model.coefficients().map(<[f64]>::to_vec);
                }
                Err(e @ TrainingError::Timeout(_)) => {
                    warn!("Fold {} ran out of time", split.index);
                    return Err(e);
                }
                Err(e) => warn!("Fold {} failed to fit: {}", split.index, e),
            }

            match report.score {
                Some(score) => debug!("Fold {} score {:.4}", split.index, score),
                None => warn!("Fold {} score is undefined and excluded from the mean", split.index),
            }
            reports.push(report);
        }

        Ok(reports)
    }

    #[allow(clippy::too_many_arguments)]
    fn fit(
        &self,
        kind: ModelKind,
        x: &Array2<f64>,
        y: &[f64],
        n_classes: usize,
        weights: Option<&[f64]>,
        rows: &[usize],
        deadline: Deadline,
    ) -> Result<FittedModel, TrainingError> {
        let x_rows = x.select(Axis(0), rows);
        let y_rows: Vec<f64> = rows.iter().map(|&i| y[i]).collect();

        match kind {
            ModelKind::LinearRegression => Ok(FittedModel::Linear(LinearRegression::fit(&x_rows, &y_rows)?)),
            ModelKind::LogisticRegression => {
                let w = balanced_weights(&y_rows, weights.map(|w| select(w, rows)));
                Ok(FittedModel::Logistic(LogisticRegression::fit(
                    &x_rows,
                    &y_rows,
                    &w,
                    self.config.logistic_c,
                    self.config.logistic_max_iter,
                    deadline,
                )?))
            }
            ModelKind::RandomForest => {
                let w = balanced_weights(&y_rows, weights.map(|w| select(w, rows)));
                let params = ForestParams {
                    n_estimators: self.config.n_estimators,
                    max_depth: self.config.max_depth,
                    min_samples_leaf: self.config.min_samples_leaf,
                    seed: self.config.seed,
                    deadline,
                };
                Ok(FittedModel::Forest(RandomForest::fit(&x_rows, &y_rows, &w, n_classes, params)?))
            }
        }
    }
}

fn select(values: &[f64], rows: &[usize]) -> Vec<f64> {
    rows.iter().map(|&i| values[i]).collect()
}

/// `n / (k · n_c)` per row, multiplied by the optional sample weights
pub fn balanced_weights(y: &[f64], sample_weights: Option<Vec<f64>>) -> Vec<f64> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for v in y {
        *counts.entry(v.round() as i64).or_insert(0) += 1;
    }
    let n = y.len() as f64;
    let k = counts.len().max(1) as f64;

    y.iter()
        .enumerate()
        .map(|(i, v)| {
            let class_count = counts.get(&(v.round() as i64)).copied().unwrap_or(1) as f64;
            let class_weight = n / (k * class_count);
            class_weight * sample_weights.as_ref().map_or(1.0, |w| w[i])
        })
        .collect()
}
