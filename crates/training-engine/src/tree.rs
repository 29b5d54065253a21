//! Weighted Gini Decision Tree

use ndarray::Array2;
use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf holding the weighted class distribution of its rows
    Leaf { distribution: Vec<f64> },
    /// Internal node; rows with `x[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Growth limits for a tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub max_features: usize,
}

/// Classification tree over class indices `0..n_classes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root: TreeNode,
    n_classes: usize,
}

struct TreeBuilder<'a, R: Rng> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    weights: &'a [f64],
    n_classes: usize,
    params: TreeParams,
    rng: &'a mut R,
}

fn gini(counts: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / total) * (c / total)).sum::<f64>()
}

impl<'a, R: Rng> TreeBuilder<'a, R> {
    fn distribution(&self, indices: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &i in indices {
            counts[self.y[i]] += self.weights[i];
        }
        counts
    }

    fn leaf(&self, counts: Vec<f64>) -> TreeNode {
        let total: f64 = counts.iter().sum();
        let distribution = if total > 0.0 {
            counts.into_iter().map(|c| c / total).collect()
        } else {
            vec![1.0 / self.n_classes as f64; self.n_classes]
        };
        TreeNode::Leaf { distribution }
    }

    fn build(&mut self, indices: &mut [usize], depth: usize) -> TreeNode {
        let counts = self.distribution(indices);
        let total: f64 = counts.iter().sum();
        let impurity = gini(&counts, total);

        if depth >= self.params.max_depth
            || indices.len() < 2 * self.params.min_samples_leaf.max(1)
            || impurity <= 0.0
        {
            return self.leaf(counts);
        }

        match self.best_split(indices) {
            Some((feature, threshold)) => {
                let (mut left, mut right): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .copied()
                    .partition(|&i| self.x[[i, feature]] <= threshold);
                TreeNode::Split {
                    feature,
                    threshold,
                    left: Box::new(self.build(&mut left, depth + 1)),
                    right: Box::new(self.build(&mut right, depth + 1)),
                }
            }
            None => self.leaf(counts),
        }
    }

    /// Lowest weighted child impurity over a random subset of features
    fn best_split(&mut self, indices: &mut [usize]) -> Option<(usize, f64)> {
        let n_features = self.x.ncols();
        let k = self.params.max_features.clamp(1, n_features.max(1));
        if n_features == 0 {
            return None;
        }
        let candidates = sample(&mut *self.rng, n_features, k);
        let min_leaf = self.params.min_samples_leaf.max(1);
        let n = indices.len();

        let mut best: Option<(f64, usize, f64)> = None;

        for feature in candidates.iter() {
            indices.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let mut left = vec![0.0; self.n_classes];
            let mut right = self.distribution(indices);
            let mut left_total = 0.0;
            let mut right_total: f64 = right.iter().sum();

            for pos in 0..n - 1 {
                let i = indices[pos];
                let w = self.weights[i];
                left[self.y[i]] += w;
                right[self.y[i]] -= w;
                left_total += w;
                right_total -= w;

                let left_rows = pos + 1;
                if left_rows < min_leaf || n - left_rows < min_leaf {
                    continue;
                }

                let here = self.x[[i, feature]];
                let next = self.x[[indices[pos + 1], feature]];
                if here >= next {
                    continue;
                }

                let score = left_total * gini(&left, left_total) + right_total * gini(&right, right_total);
                if best.map_or(true, |(s, _, _)| score < s) {
                    best = Some((score, feature, here + (next - here) / 2.0));
                }
            }
        }

        best.map(|(_, feature, threshold)| (feature, threshold))
    }
}

impl DecisionTree {
    /// Grow a tree on the given rows
    ///
    /// `y` holds class indices, `weights` per-row weights (bootstrap counts
    /// folded in). Only rows listed in `indices` are used.
    pub fn fit<R: Rng>(
        x: &Array2<f64>,
        y: &[usize],
        weights: &[f64],
        indices: &[usize],
        n_classes: usize,
        params: TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut builder = TreeBuilder {
            x,
            y,
            weights,
            n_classes,
            params,
            rng,
        };
        let mut indices = indices.to_vec();
        let root = builder.build(&mut indices, 0);
        Self { root, n_classes }
    }

    /// Class distribution of the leaf reached by `row`
    pub fn predict_proba(&self, row: &[f64]) -> &[f64] {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { distribution } => return distribution,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(*feature).copied().unwrap_or(0.0);
                    node = if value <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }
}
