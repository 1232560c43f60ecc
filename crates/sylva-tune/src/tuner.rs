//! Grid-search driver over a resampling plan.

use tracing::{debug, info, instrument};

use sylva_cv::ResamplingPlan;
use sylva_rf::{Metric, Predictor, RegressionForestConfig};

use crate::archive::{TrialRecord, mean_scores};
use crate::error::TuneError;
use crate::grid::{ParamGrid, ParamSet};

/// Exhaustive grid search over hyperparameter combinations.
///
/// For every combination and every fold of the plan, a forest is
/// fitted on the fold's training rows and scored on its test rows.
/// The combination with the best mean score wins; ties go to the
/// earlier combination in grid order.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | `metric` | [`Metric::Rmse`] |
#[derive(Debug, Clone)]
pub struct GridSearch {
    base: RegressionForestConfig,
    grid: ParamGrid,
    metric: Metric,
}

/// Outcome of a grid search.
#[derive(Debug)]
pub struct TuneResult {
    best_params: ParamSet,
    best_score: f64,
    metric: Metric,
    archive: Vec<TrialRecord>,
    n_models: usize,
}

impl TuneResult {
    /// The winning hyperparameter combination.
    #[must_use]
    pub fn best_params(&self) -> ParamSet {
        self.best_params
    }

    /// Mean test score of the winning combination.
    #[must_use]
    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    /// Metric the search optimized.
    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Every fitted trial, in combination-then-fold order.
    #[must_use]
    pub fn archive(&self) -> &[TrialRecord] {
        &self.archive
    }

    /// Total number of models fitted.
    #[must_use]
    pub fn n_models(&self) -> usize {
        self.n_models
    }
}

impl GridSearch {
    /// Create a grid search over `grid` starting from `base`.
    #[must_use]
    pub fn new(base: RegressionForestConfig, grid: ParamGrid) -> Self {
        Self {
            base,
            grid,
            metric: Metric::Rmse,
        }
    }

    /// Set the metric to optimize.
    #[must_use]
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// The metric being optimized.
    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Run the search over `plan`, fitting one model per combination
    /// per fold.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TuneError::PlanMismatch`] | plan and dataset sizes disagree |
    /// | [`TuneError::LengthMismatch`] | features and targets disagree |
    /// | [`TuneError::Train`] | a fit or scoring call failed |
    #[instrument(skip_all, fields(n_combos = self.grid.n_combinations(), n_folds = plan.n_folds()))]
    pub fn run(
        &self,
        features: &[Vec<f64>],
        targets: &[f64],
        feature_names: &[String],
        plan: &ResamplingPlan,
    ) -> Result<TuneResult, TuneError> {
        if features.len() != targets.len() {
            return Err(TuneError::LengthMismatch {
                n_features: features.len(),
                n_targets: targets.len(),
            });
        }
        if plan.n_observations() != features.len() {
            return Err(TuneError::PlanMismatch {
                n_plan: plan.n_observations(),
                n_data: features.len(),
            });
        }

        let combinations = self.grid.combinations();
        let mut archive = Vec::with_capacity(combinations.len() * plan.n_folds());

        for set in &combinations {
            for (fold_idx, fold) in plan.folds().iter().enumerate() {
                let config = set
                    .apply(&self.base)
                    .with_seed(self.base.seed().wrapping_add(fold_idx as u64));

                let train_features = gather_rows(features, &fold.train);
                let train_targets = gather(targets, &fold.train);
                let test_features = gather_rows(features, &fold.test);
                let test_targets = gather(targets, &fold.test);

                let result = config.fit(&train_features, &train_targets, feature_names)?;
                let predictions = result.forest().predict_rows(&test_features)?;
                let score = self.metric.evaluate(&predictions, &test_targets)?;

                debug!(
                    combo = set.combo_index,
                    fold = fold_idx,
                    score,
                    "trial scored"
                );
                archive.push(TrialRecord {
                    combo_index: set.combo_index,
                    mtry: set.mtry,
                    min_node_size: set.min_node_size,
                    fold: fold_idx,
                    score,
                });
            }
        }

        // Ties break toward the earlier combination in grid order.
        let scores = mean_scores(&archive, combinations.len());
        let mut best_idx = 0;
        for (i, combo) in scores.iter().enumerate().skip(1) {
            if self.metric.is_better(combo.mean_score, scores[best_idx].mean_score) {
                best_idx = i;
            }
        }

        let n_models = archive.len();
        info!(
            best_combo = best_idx,
            best_score = scores[best_idx].mean_score,
            n_models,
            "grid search complete"
        );

        Ok(TuneResult {
            best_params: combinations[best_idx],
            best_score: scores[best_idx].mean_score,
            metric: self.metric,
            archive,
            n_models,
        })
    }
}

fn gather_rows(rows: &[Vec<f64>], indices: &[usize]) -> Vec<Vec<f64>> {
    indices.iter().map(|&i| rows[i].clone()).collect()
}

fn gather(values: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|&i| values[i]).collect()
}
