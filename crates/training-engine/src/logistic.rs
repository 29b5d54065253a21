//! L2-Regularized Logistic Regression

use crate::deadline::Deadline;
use crate::error::TrainingError;
use crate::linalg::solve_symmetric;
use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

const GRADIENT_TOLERANCE: f64 = 1e-8;

/// Numerically stable logistic function
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Binary logistic model with an unpenalized intercept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LogisticRegression {
    /// Fit with Newton's method (IRLS) and backtracking line search
    ///
    /// Minimizes `c · Σ wᵢ · logloss(yᵢ, pᵢ) + ½‖β‖²`. Targets must be 0/1.
    /// Fails with `Timeout` if `deadline` passes between Newton steps.
    pub fn fit(
        x: &Array2<f64>,
        y: &[f64],
        weights: &[f64],
        c: f64,
        max_iter: usize,
        deadline: Deadline,
    ) -> Result<Self, TrainingError> {
        let n = x.nrows();
        let p = x.ncols();
        if n == 0 || y.len() != n || weights.len() != n {
            return Err(TrainingError::InsufficientData(format!(
                "logistic regression needs matching non-empty inputs, got {} rows, {} targets, {} weights",
                n,
                y.len(),
                weights.len()
            )));
        }
        if c.is_nan() || c <= 0.0 {
            return Err(TrainingError::Solver(format!("regularization C must be positive, got {}", c)));
        }

        // Design matrix with a trailing intercept column
        let mut design = Array2::<f64>::ones((n, p + 1));
        design.slice_mut(s![.., ..p]).assign(x);

        let y = Array1::from_vec(y.to_vec());
        let w = Array1::from_vec(weights.to_vec());
        let mut beta = Array1::<f64>::zeros(p + 1);

        let objective = |beta: &Array1<f64>| -> f64 {
            let z = design.dot(beta);
            let loss: f64 = z
                .iter()
                .zip(y.iter())
                .zip(w.iter())
                .map(|((&zi, &yi), &wi)| wi * (softplus(zi) - yi * zi))
                .sum();
            let penalty: f64 = beta.iter().take(p).map(|b| b * b).sum::<f64>() * 0.5;
            c * loss + penalty
        };

        let mut current = objective(&beta);
        let mut iterations = 0;

        for iter in 0..max_iter {
            deadline.check()?;
            iterations = iter + 1;
            let z = design.dot(&beta);
            let prob = z.mapv(sigmoid);

            let residual = (&prob - &y) * &w;
            let mut gradient = design.t().dot(&residual) * c;
            for j in 0..p {
                gradient[j] += beta[j];
            }

            if gradient.iter().fold(0.0f64, |m, g| m.max(g.abs())) < GRADIENT_TOLERANCE {
                break;
            }

            let curvature = prob.mapv(|pi| pi * (1.0 - pi)) * &w * c;
            let weighted = &design * &curvature.insert_axis(Axis(1));
            let mut hessian = design.t().dot(&weighted);
            for j in 0..p {
                hessian[[j, j]] += 1.0;
            }

            let step = solve_symmetric(&hessian, &gradient)
                .ok_or_else(|| TrainingError::Solver("singular Hessian".to_string()))?;

            let mut t = 1.0;
            let mut accepted = false;
            while t > 1e-10 {
                let candidate = &beta - &(&step * t);
                let value = objective(&candidate);
                if value.is_finite() && value <= current {
                    beta = candidate;
                    accepted = value < current;
                    current = value;
                    break;
                }
                t *= 0.5;
            }

            if !accepted {
                break;
            }
        }

        debug!("Logistic regression converged after {} Newton steps", iterations);

        if beta.iter().any(|b| !b.is_finite()) {
            return Err(TrainingError::Solver("non-finite coefficients".to_string()));
        }

        Ok(Self {
            coefficients: beta.iter().take(p).copied().collect(),
            intercept: beta[p],
        })
    }

    /// Linear score before the logistic link
    pub fn decision_value<'a, I>(&self, row: I) -> f64
    where
        I: IntoIterator<Item = &'a f64>,
    {
        self.coefficients
            .iter()
            .zip(row)
            .map(|(c, x)| c * x)
            .sum::<f64>()
            + self.intercept
    }

    /// Probability of the positive class
    pub fn predict_proba_row(&self, row: &[f64]) -> f64 {
        sigmoid(self.decision_value(row))
    }

    /// Class index (0 or 1) per row at threshold 0.5
    pub fn predict(&self, x: &Array2<f64>) -> Vec<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                if sigmoid(self.decision_value(row.iter())) >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            })
            .collect()
    }
}
