//! Ordinary Least Squares Regression

use crate::error::TrainingError;
use crate::linalg::solve_symmetric;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Linear model `y = x · coefficients + intercept`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegression {
    /// Fit by solving the centered normal equations
    pub fn fit(x: &Array2<f64>, y: &[f64]) -> Result<Self, TrainingError> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(TrainingError::InsufficientData(format!(
                "linear regression needs matching non-empty inputs, got {} rows and {} targets",
                n,
                y.len()
            )));
        }

        let y = Array1::from_vec(y.to_vec());
        let y_mean = y.sum() / n as f64;
        let x_mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));

        if x.ncols() == 0 {
            return Ok(Self {
                coefficients: Vec::new(),
                intercept: y_mean,
            });
        }

        let xc = x - &x_mean;
        let yc = &y - y_mean;
        let xtx = xc.t().dot(&xc);
        let xty = xc.t().dot(&yc);

        let coefficients = solve_symmetric(&xtx, &xty)
            .ok_or_else(|| TrainingError::Solver("normal equations are singular".to_string()))?;
        let intercept = y_mean - x_mean.dot(&coefficients);

        Ok(Self {
            coefficients: coefficients.to_vec(),
            intercept,
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(row)
            .map(|(c, x)| c * x)
            .sum::<f64>()
            + self.intercept
    }

    pub fn predict(&self, x: &Array2<f64>) -> Vec<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .zip(&self.coefficients)
                    .map(|(x, c)| x * c)
                    .sum::<f64>()
                    + self.intercept
            })
            .collect()
    }
}
