//! Random Forest Classifier

use crate::deadline::Deadline;
use crate::error::TrainingError;
use crate::tree::{DecisionTree, TreeParams};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
    /// Trees not started by this time are not grown
    pub deadline: Deadline,
}

/// Bagged ensemble of Gini trees with √features per split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
    n_features: usize,
}

impl RandomForest {
    /// Fit on class indices `y` with per-row `weights`
    ///
    /// Each tree sees a bootstrap sample drawn with its own seed; bootstrap
    /// multiplicity is folded into the row weights.
    pub fn fit(
        x: &Array2<f64>,
        y: &[f64],
        weights: &[f64],
        n_classes: usize,
        params: ForestParams,
    ) -> Result<Self, TrainingError> {
        let n = x.nrows();
        if n == 0 || y.len() != n || weights.len() != n {
            return Err(TrainingError::InsufficientData(format!(
                "random forest needs matching non-empty inputs, got {} rows, {} targets, {} weights",
                n,
                y.len(),
                weights.len()
            )));
        }
        if n_classes == 0 {
            return Err(TrainingError::InvalidTarget("no classes to learn".to_string()));
        }

        let labels: Vec<usize> = y
            .iter()
            .map(|v| (v.round().max(0.0) as usize).min(n_classes - 1))
            .collect();
        let n_features = x.ncols();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_leaf: params.min_samples_leaf,
            max_features: ((n_features as f64).sqrt().floor() as usize).max(1),
        };

        let trees = (0..params.n_estimators.max(1))
            .into_par_iter()
            .map(|tree_idx| {
                params.deadline.check()?;
                let mut rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(tree_idx as u64));

                let mut counts = vec![0usize; n];
                for _ in 0..n {
                    counts[rng.gen_range(0..n)] += 1;
                }
                let boot_weights: Vec<f64> = counts
                    .iter()
                    .zip(weights)
                    .map(|(&c, &w)| c as f64 * w)
                    .collect();
                let rows: Vec<usize> = (0..n).filter(|&i| counts[i] > 0).collect();

                Ok(DecisionTree::fit(
                    x,
                    &labels,
                    &boot_weights,
                    &rows,
                    n_classes,
                    tree_params,
                    &mut rng,
                ))
            })
            .collect::<Result<Vec<DecisionTree>, TrainingError>>()?;

        debug!(
            "Grew {} trees on {} rows × {} features",
            trees.len(),
            n,
            n_features
        );

        Ok(Self {
            trees,
            n_classes,
            n_features,
        })
    }

    /// Mean class distribution across trees
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in proba.iter_mut().zip(tree.predict_proba(row)) {
                *acc += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }

    /// Most probable class index and its probability
    pub fn predict_row(&self, row: &[f64]) -> (usize, f64) {
        self.predict_proba(row)
            .into_iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (idx, p)| if p > best.1 { (idx, p) } else { best })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Vec<f64> {
        x.rows()
            .into_iter()
            .map(|row| self.predict_row(&row.to_vec()).0 as f64)
            .collect()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Encode as an opaque postcard blob
    pub fn to_bytes(&self) -> Result<Vec<u8>, TrainingError> {
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TrainingError> {
        Ok(postcard::from_bytes(bytes)?)
    }
}
