//! Regression error metrics.

use crate::error::RfError;

/// Named evaluation metric for scoring predictions against ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Metric {
    /// Root-mean-squared error (lower is better).
    Rmse,
    /// Mean absolute error (lower is better).
    Mae,
    /// Coefficient of determination (higher is better).
    RSquared,
}

impl Metric {
    /// Score `predicted` against `actual`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::MetricLengthMismatch`] | input lengths differ |
    /// | [`RfError::EmptyMetricInput`] | inputs are empty |
    pub fn evaluate(&self, predicted: &[f64], actual: &[f64]) -> Result<f64, RfError> {
        match self {
            Metric::Rmse => rmse(predicted, actual),
            Metric::Mae => mae(predicted, actual),
            Metric::RSquared => r_squared(predicted, actual),
        }
    }

    /// Return `true` when a lower score is better for this metric.
    #[must_use]
    pub fn prefers_lower(&self) -> bool {
        match self {
            Metric::Rmse | Metric::Mae => true,
            Metric::RSquared => false,
        }
    }

    /// Return `true` when score `a` is strictly better than score `b`.
    #[must_use]
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        if self.prefers_lower() { a < b } else { a > b }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Rmse => f.write_str("rmse"),
            Metric::Mae => f.write_str("mae"),
            Metric::RSquared => f.write_str("r_squared"),
        }
    }
}

fn check_inputs(predicted: &[f64], actual: &[f64]) -> Result<(), RfError> {
    if predicted.len() != actual.len() {
        return Err(RfError::MetricLengthMismatch {
            n_predicted: predicted.len(),
            n_actual: actual.len(),
        });
    }
    if predicted.is_empty() {
        return Err(RfError::EmptyMetricInput);
    }
    Ok(())
}

/// Root-mean-squared error: `sqrt(mean((predicted - actual)^2))`.
///
/// # Errors
///
/// Returns [`RfError::MetricLengthMismatch`] or [`RfError::EmptyMetricInput`]
/// on malformed inputs.
pub fn rmse(predicted: &[f64], actual: &[f64]) -> Result<f64, RfError> {
    check_inputs(predicted, actual)?;
    let mse = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).powi(2))
        .sum::<f64>()
        / predicted.len() as f64;
    Ok(mse.sqrt())
}

/// Mean absolute error: `mean(|predicted - actual|)`.
///
/// # Errors
///
/// Returns [`RfError::MetricLengthMismatch`] or [`RfError::EmptyMetricInput`]
/// on malformed inputs.
pub fn mae(predicted: &[f64], actual: &[f64]) -> Result<f64, RfError> {
    check_inputs(predicted, actual)?;
    let total = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).abs())
        .sum::<f64>();
    Ok(total / predicted.len() as f64)
}

/// Coefficient of determination: `1 - SS_res / SS_tot`.
///
/// Returns 0.0 when the ground truth is constant and predictions are not
/// exact (SS_tot is zero), avoiding a division by zero.
///
/// # Errors
///
/// Returns [`RfError::MetricLengthMismatch`] or [`RfError::EmptyMetricInput`]
/// on malformed inputs.
pub fn r_squared(predicted: &[f64], actual: &[f64]) -> Result<f64, RfError> {
    check_inputs(predicted, actual)?;
    let mean_actual = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
    let ss_res: f64 = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).powi(2))
        .sum();
    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rmse_exact_formula() {
        // predictions [1, 2], actual [3, 4]: mean((2)^2, (2)^2) = 4 → rmse 2.
        let result = rmse(&[1.0, 2.0], &[3.0, 4.0]).unwrap();
        assert!((result - 2.0).abs() < 1e-12);
    }

    #[test]
    fn rmse_perfect_predictions() {
        let result = rmse(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert!(result.abs() < 1e-12);
    }

    #[test]
    fn rmse_invariant_under_identical_permutation() {
        let p = vec![1.0, 5.0, 3.0, 8.0];
        let a = vec![2.0, 4.0, 3.5, 7.0];
        let direct = rmse(&p, &a).unwrap();

        // Apply the same reordering to both vectors.
        let order = [3usize, 0, 2, 1];
        let p2: Vec<f64> = order.iter().map(|&i| p[i]).collect();
        let a2: Vec<f64> = order.iter().map(|&i| a[i]).collect();
        let permuted = rmse(&p2, &a2).unwrap();

        assert!((direct - permuted).abs() < 1e-12);
    }

    #[test]
    fn mae_exact_formula() {
        let result = mae(&[1.0, 2.0], &[2.0, 4.0]).unwrap();
        assert!((result - 1.5).abs() < 1e-12);
    }

    #[test]
    fn r_squared_perfect_is_one() {
        let result = r_squared(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert!((result - 1.0).abs() < 1e-12);
    }

    #[test]
    fn r_squared_mean_prediction_is_zero() {
        // Predicting the mean everywhere gives R² = 0.
        let actual = [1.0, 2.0, 3.0];
        let result = r_squared(&[2.0, 2.0, 2.0], &actual).unwrap();
        assert!(result.abs() < 1e-12);
    }

    #[test]
    fn r_squared_constant_actual() {
        assert!((r_squared(&[5.0, 5.0], &[5.0, 5.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!(r_squared(&[4.0, 6.0], &[5.0, 5.0]).unwrap().abs() < 1e-12);
    }

    #[test]
    fn length_mismatch_error() {
        let err = rmse(&[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            RfError::MetricLengthMismatch { n_predicted: 1, n_actual: 2 }
        ));
    }

    #[test]
    fn empty_input_error() {
        let err = rmse(&[], &[]).unwrap_err();
        assert!(matches!(err, RfError::EmptyMetricInput));
    }

    #[test]
    fn metric_enum_dispatch() {
        let p = [1.0, 2.0];
        let a = [3.0, 4.0];
        assert!((Metric::Rmse.evaluate(&p, &a).unwrap() - 2.0).abs() < 1e-12);
        assert!((Metric::Mae.evaluate(&p, &a).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn metric_ordering_direction() {
        assert!(Metric::Rmse.is_better(0.5, 1.0));
        assert!(!Metric::Rmse.is_better(1.0, 0.5));
        assert!(Metric::RSquared.is_better(0.9, 0.5));
    }
}
