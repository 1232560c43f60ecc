//! Hyperparameter grids and their enumerated combinations.

use serde::Serialize;

use sylva_rf::{Mtry, RegressionForestConfig};

use crate::error::TuneError;

/// Candidate hyperparameter values for a grid search.
///
/// An empty candidate list keeps the base configuration's value for
/// that parameter, contributing a single "unchanged" choice to the
/// cartesian product.
#[derive(Debug, Clone, Default)]
pub struct ParamGrid {
    mtry: Vec<usize>,
    min_node_size: Vec<usize>,
}

impl ParamGrid {
    /// Create an empty grid (a single combination: the base config).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the mtry candidates.
    ///
    /// # Errors
    ///
    /// Returns [`TuneError::InvalidCandidate`] if any candidate is zero.
    pub fn with_mtry_candidates(mut self, candidates: Vec<usize>) -> Result<Self, TuneError> {
        if let Some(&value) = candidates.iter().find(|&&v| v == 0) {
            return Err(TuneError::InvalidCandidate {
                param: "mtry",
                value,
            });
        }
        self.mtry = candidates;
        Ok(self)
    }

    /// Set the minimum-node-size candidates.
    ///
    /// # Errors
    ///
    /// Returns [`TuneError::InvalidCandidate`] if any candidate is zero.
    pub fn with_min_node_size_candidates(
        mut self,
        candidates: Vec<usize>,
    ) -> Result<Self, TuneError> {
        if let Some(&value) = candidates.iter().find(|&&v| v == 0) {
            return Err(TuneError::InvalidCandidate {
                param: "min_node_size",
                value,
            });
        }
        self.min_node_size = candidates;
        Ok(self)
    }

    /// Number of combinations the grid enumerates.
    #[must_use]
    pub fn n_combinations(&self) -> usize {
        self.mtry.len().max(1) * self.min_node_size.len().max(1)
    }

    /// Enumerate all combinations in deterministic order.
    ///
    /// The mtry axis varies slowest; an empty axis contributes a
    /// single `None` choice.
    #[must_use]
    pub fn combinations(&self) -> Vec<ParamSet> {
        let mtry_axis: Vec<Option<usize>> = if self.mtry.is_empty() {
            vec![None]
        } else {
            self.mtry.iter().copied().map(Some).collect()
        };
        let node_axis: Vec<Option<usize>> = if self.min_node_size.is_empty() {
            vec![None]
        } else {
            self.min_node_size.iter().copied().map(Some).collect()
        };

        let mut sets = Vec::with_capacity(mtry_axis.len() * node_axis.len());
        for &mtry in &mtry_axis {
            for &min_node_size in &node_axis {
                sets.push(ParamSet {
                    combo_index: sets.len(),
                    mtry,
                    min_node_size,
                });
            }
        }
        sets
    }
}

/// One point in the hyperparameter grid.
///
/// `None` means the base configuration's value is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamSet {
    /// Position of this combination in grid enumeration order.
    pub combo_index: usize,
    /// Fixed mtry, or `None` to keep the base value.
    pub mtry: Option<usize>,
    /// Minimum node size, or `None` to keep the base value.
    pub min_node_size: Option<usize>,
}

impl ParamSet {
    /// Apply this combination on top of a base configuration.
    #[must_use]
    pub fn apply(&self, base: &RegressionForestConfig) -> RegressionForestConfig {
        let mut config = base.clone();
        if let Some(mtry) = self.mtry {
            config = config.with_mtry(Mtry::Fixed(mtry));
        }
        if let Some(min_node_size) = self.min_node_size {
            config = config.with_min_node_size(min_node_size);
        }
        config
    }
}
