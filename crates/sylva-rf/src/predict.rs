//! Prediction methods for the Random Forest regression ensemble.
//!
//! The [`Predictor`] trait is the single prediction seam: tabular scoring
//! and raster-surface rendering both go through it, parameterized only by
//! input shape at the call site.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::error::RfError;
use crate::forest::RegressionForest;

/// Capability to predict a continuous response from feature rows.
pub trait Predictor {
    /// Return the number of features expected per row.
    fn n_inputs(&self) -> usize;

    /// Predict the response value for a single feature row.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when
    /// `row.len() != n_inputs()`.
    fn predict_row(&self, row: &[f64]) -> Result<f64, RfError>;

    /// Predict response values for a batch of feature rows.
    ///
    /// # Errors
    ///
    /// Returns the first row-level error encountered.
    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, RfError> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }
}

impl Predictor for RegressionForest {
    fn n_inputs(&self) -> usize {
        self.n_features
    }

    /// Mean of the per-tree predictions.
    fn predict_row(&self, row: &[f64]) -> Result<f64, RfError> {
        if row.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: row.len(),
            });
        }
        let mut sum = 0.0f64;
        for tree in &self.trees {
            sum += tree.predict(row)?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Batch prediction, parallelized over rows with rayon.
    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, RfError> {
        rows.par_iter().map(|row| self.predict_row(row)).collect()
    }
}
