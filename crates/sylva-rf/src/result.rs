//! Training result types for Random Forest regression.

use crate::forest::RegressionForest;
use crate::importance::RankedFeature;
use crate::oob::OobScore;

/// Metadata about the training run.
#[derive(Debug, Clone)]
pub struct TrainingMetadata {
    /// Number of trees trained.
    pub n_trees: usize,
    /// Number of features in the dataset.
    pub n_features: usize,
    /// Number of training samples.
    pub n_samples: usize,
    /// Resolved mtry value used.
    pub mtry_resolved: usize,
}

/// Result of Random Forest regression training.
///
/// Contains the fitted forest, feature importances, optional OOB score,
/// per-tree OOB indices, and training metadata.
#[derive(Debug)]
pub struct RegressionForestResult {
    forest: RegressionForest,
    importances: Vec<RankedFeature>,
    oob_score: Option<OobScore>,
    oob_indices_per_tree: Vec<Vec<usize>>,
    metadata: TrainingMetadata,
}

impl RegressionForestResult {
    /// Create a new training result.
    pub(crate) fn new(
        forest: RegressionForest,
        importances: Vec<RankedFeature>,
        oob_score: Option<OobScore>,
        oob_indices_per_tree: Vec<Vec<usize>>,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            forest,
            importances,
            oob_score,
            oob_indices_per_tree,
            metadata,
        }
    }

    /// Return the fitted forest.
    #[must_use]
    pub fn forest(&self) -> &RegressionForest {
        &self.forest
    }

    /// Consume the result and return the fitted forest.
    #[must_use]
    pub fn into_forest(self) -> RegressionForest {
        self.forest
    }

    /// Return the ranked feature importances.
    #[must_use]
    pub fn importances(&self) -> &[RankedFeature] {
        &self.importances
    }

    /// Return the OOB score, if OOB evaluation was enabled.
    #[must_use]
    pub fn oob_score(&self) -> Option<&OobScore> {
        self.oob_score.as_ref()
    }

    /// Return the out-of-bag sample indices for each tree.
    #[must_use]
    pub fn oob_indices_per_tree(&self) -> &[Vec<usize>] {
        &self.oob_indices_per_tree
    }

    /// Return metadata about the training run.
    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }
}
