//! Error types for grid-search tuning.

use thiserror::Error;

use sylva_rf::RfError;

/// Errors produced while building or running a grid search.
#[derive(Debug, Error)]
pub enum TuneError {
    /// A candidate value is outside its valid range.
    #[error("invalid candidate {value} for parameter {param}")]
    InvalidCandidate {
        /// Parameter name.
        param: &'static str,
        /// Offending candidate value.
        value: usize,
    },

    /// The resampling plan indexes a different number of observations
    /// than the dataset provides.
    #[error("plan covers {n_plan} observations but the dataset has {n_data}")]
    PlanMismatch {
        /// Observations the plan was built for.
        n_plan: usize,
        /// Rows in the dataset.
        n_data: usize,
    },

    /// Targets and features disagree in length.
    #[error("feature rows ({n_features}) and targets ({n_targets}) differ in length")]
    LengthMismatch {
        /// Number of feature rows.
        n_features: usize,
        /// Number of target values.
        n_targets: usize,
    },

    /// Model training or scoring failed.
    #[error("model training failed")]
    Train(#[from] RfError),
}
