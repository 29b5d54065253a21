//! Class × Group Imbalance Weighting

use crate::error::FeatureError;
use std::collections::HashMap;
use tracing::debug;

/// Computes per-row weights that balance rare (class, group) combinations
pub struct ImbalanceWeighter;

impl ImbalanceWeighter {
    /// Canonical group label: trimmed, title-cased
    pub fn normalize_group(label: &str) -> String {
        let mut out = String::with_capacity(label.len());
        let mut prev_alpha = false;
        for ch in label.trim().chars() {
            if ch.is_alphabetic() {
                if prev_alpha {
                    out.extend(ch.to_lowercase());
                } else {
                    out.extend(ch.to_uppercase());
                }
                prev_alpha = true;
            } else {
                out.push(ch);
                prev_alpha = false;
            }
        }
        out
    }

    /// Weight each row by `1 / n(class, group)`, normalized to mean 1
    pub fn compute_weights(target: &[f64], groups: &[String]) -> Result<Vec<f64>, FeatureError> {
        if target.len() != groups.len() {
            return Err(FeatureError::ShapeMismatch {
                expected: target.len(),
                actual: groups.len(),
            });
        }
        if target.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<(i64, &str)> = target
            .iter()
            .zip(groups)
            .map(|(y, g)| (y.round() as i64, g.as_str()))
            .collect();

        let mut counts: HashMap<(i64, &str), usize> = HashMap::new();
        for key in &keys {
            *counts.entry(*key).or_insert(0) += 1;
        }

        let raw: Vec<f64> = keys
            .iter()
            .map(|key| 1.0 / counts.get(key).copied().unwrap_or(1) as f64)
            .collect();

        let mean = raw.iter().sum::<f64>() / raw.len() as f64;
        let divisor = if mean.is_finite() && mean != 0.0 { mean } else { 1.0 };

        debug!(
            "Computed imbalance weights over {} (class, group) cells",
            counts.len()
        );

        Ok(raw.into_iter().map(|w| w / divisor).collect())
    }
}
