//! Validation scores

use std::collections::BTreeMap;

/// Coefficient of determination
///
/// None when the input is empty, the truth is constant, or the result is
/// not finite.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> Option<f64> {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return None;
    }

    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|y| (y - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return None;
    }
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(y, p)| (y - p).powi(2))
        .sum();

    let score = 1.0 - ss_res / ss_tot;
    score.is_finite().then_some(score)
}

/// Mean per-class recall over the classes present in `y_true`
pub fn balanced_accuracy(y_true: &[f64], y_pred: &[f64]) -> Option<f64> {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return None;
    }

    let mut per_class: BTreeMap<i64, (usize, usize)> = BTreeMap::new();
    for (t, p) in y_true.iter().zip(y_pred) {
        let entry = per_class.entry(t.round() as i64).or_insert((0, 0));
        entry.0 += 1;
        if t.round() == p.round() {
            entry.1 += 1;
        }
    }

    let recall_sum: f64 = per_class
        .values()
        .map(|(total, hits)| *hits as f64 / *total as f64)
        .sum();
    let score = recall_sum / per_class.len() as f64;
    score.is_finite().then_some(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_r2_perfect_and_mean() {
        let y = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(r2_score(&y, &y), Some(1.0));
        assert_eq!(r2_score(&y, &[2.5; 4]), Some(0.0));
    }

    #[test]
    fn test_r2_undefined() {
        assert_eq!(r2_score(&[3.0, 3.0], &[3.0, 2.0]), None);
        assert_eq!(r2_score(&[], &[]), None);
    }

    #[test]
    fn test_balanced_accuracy() {
        // class 0: 3/4 correct, class 1: 1/1 correct
        let y_true = [0.0, 0.0, 0.0, 0.0, 1.0];
        let y_pred = [0.0, 0.0, 0.0, 1.0, 1.0];
        assert_eq!(balanced_accuracy(&y_true, &y_pred), Some(0.875));
    }

    #[test]
    fn test_balanced_accuracy_majority_guess() {
        let y_true = [0.0, 0.0, 0.0, 1.0];
        let y_pred = [0.0, 0.0, 0.0, 0.0];
        assert_eq!(balanced_accuracy(&y_true, &y_pred), Some(0.5));
    }
}
