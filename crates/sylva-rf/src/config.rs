//! Configuration builder for Random Forest regression training.

use crate::error::RfError;
use crate::result::RegressionForestResult;

/// Strategy for determining the number of features considered at each split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mtry {
    /// One third of total features (the regression convention).
    Third,
    /// Square root of total features.
    Sqrt,
    /// A fraction of total features (must be in (0.0, 1.0]).
    Fraction(f64),
    /// A fixed count.
    Fixed(usize),
    /// All features (no subsampling).
    All,
}

/// Whether to compute out-of-bag evaluation during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OobMode {
    /// Compute OOB error metrics.
    Enabled,
    /// Skip OOB evaluation.
    Disabled,
}

/// Configuration for Random Forest regression training.
///
/// Construct via [`RegressionForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter            | Default     |
/// |----------------------|-------------|
/// | `mtry`               | `Third`     |
/// | `max_depth`          | `None`      |
/// | `min_samples_split`  | 2           |
/// | `min_node_size`      | 5           |
/// | `seed`               | 42          |
/// | `oob_mode`           | `Disabled`  |
/// | `bootstrap_fraction` | 1.0         |
#[derive(Debug, Clone)]
pub struct RegressionForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) mtry: Mtry,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_node_size: usize,
    pub(crate) seed: u64,
    pub(crate) oob_mode: OobMode,
    pub(crate) bootstrap_fraction: f64,
}

impl RegressionForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RfError> {
        if n_trees == 0 {
            return Err(RfError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            mtry: Mtry::Third,
            max_depth: None,
            min_samples_split: 2,
            min_node_size: 5,
            seed: 42,
            oob_mode: OobMode::Disabled,
            bootstrap_fraction: 1.0,
        })
    }

    // --- Setters ---

    /// Set the mtry strategy.
    #[must_use]
    pub fn with_mtry(mut self, mtry: Mtry) -> Self {
        self.mtry = mtry;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of samples required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of samples required in each child after a split.
    #[must_use]
    pub fn with_min_node_size(mut self, min_node_size: usize) -> Self {
        self.min_node_size = min_node_size;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the OOB evaluation mode.
    #[must_use]
    pub fn with_oob_mode(mut self, oob_mode: OobMode) -> Self {
        self.oob_mode = oob_mode;
        self
    }

    /// Set the bootstrap fraction (proportion of samples drawn per tree).
    #[must_use]
    pub fn with_bootstrap_fraction(mut self, bootstrap_fraction: f64) -> Self {
        self.bootstrap_fraction = bootstrap_fraction;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the mtry strategy.
    #[must_use]
    pub fn mtry(&self) -> Mtry {
        self.mtry
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum samples required to split a node.
    #[must_use]
    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    /// Return the minimum samples required in each child.
    #[must_use]
    pub fn min_node_size(&self) -> usize {
        self.min_node_size
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the OOB evaluation mode.
    #[must_use]
    pub fn oob_mode(&self) -> OobMode {
        self.oob_mode
    }

    /// Return the bootstrap fraction.
    #[must_use]
    pub fn bootstrap_fraction(&self) -> f64 {
        self.bootstrap_fraction
    }

    /// Train a Random Forest regressor on the provided dataset.
    ///
    /// `features[sample_idx][feature_idx]` — row-major layout.
    /// `targets[sample_idx]` — continuous response values.
    /// `feature_names` — names for each feature column.
    ///
    /// # Errors
    ///
    /// | Variant                               | When                                          |
    /// |---------------------------------------|-----------------------------------------------|
    /// | [`RfError::EmptyDataset`]             | `features` is empty                           |
    /// | [`RfError::ZeroFeatures`]             | rows have zero feature columns                |
    /// | [`RfError::FeatureCountMismatch`]     | rows have inconsistent lengths                |
    /// | [`RfError::TargetCountMismatch`]      | `targets.len() != features.len()`             |
    /// | [`RfError::NonFiniteValue`]           | any feature value is NaN or infinite          |
    /// | [`RfError::NonFiniteTarget`]          | any target value is NaN or infinite           |
    /// | [`RfError::InvalidMtry`]              | resolved mtry is outside [1, n_features]      |
    /// | [`RfError::InvalidBootstrapFraction`] | bootstrap_fraction is not in (0.0, 1.0]       |
    /// | [`RfError::InvalidMaxDepth`]          | max_depth is `Some(0)`                        |
    /// | [`RfError::InvalidMinSamplesSplit`]   | min_samples_split < 2                         |
    /// | [`RfError::InvalidMinNodeSize`]       | min_node_size < 1                             |
    /// | [`RfError::OobEvaluationFailed`]      | OOB enabled but no sample has any OOB tree    |
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        targets: &[f64],
        feature_names: &[String],
    ) -> Result<RegressionForestResult, RfError> {
        crate::forest::train(self, features, targets, feature_names)
    }
}
