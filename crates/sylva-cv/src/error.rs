//! Error types for resampling-plan construction.

use thiserror::Error;

/// Errors produced while building resampling plans or domain geometry.
#[derive(Debug, Error)]
pub enum CvError {
    /// Fold count must be at least two for cross-validation.
    #[error("fold count must be at least 2, got {0}")]
    InvalidFoldCount(usize),

    /// Holdout ratio must be strictly between zero and one.
    #[error("holdout ratio must be in (0, 1), got {0}")]
    InvalidRatio(f64),

    /// Block side length must be positive and finite.
    #[error("block range must be positive and finite, got {0}")]
    InvalidBlockRange(f64),

    /// No observations were supplied.
    #[error("cannot build a resampling plan from zero observations")]
    EmptyObservations,

    /// An observation coordinate is NaN or infinite.
    #[error("non-finite coordinate at observation {index}")]
    NonFiniteCoordinate {
        /// Index of the offending observation.
        index: usize,
    },

    /// Fewer observations than folds requested.
    #[error("cannot split {n_observations} observations into {n_folds} folds")]
    TooFewObservations {
        /// Number of observations supplied.
        n_observations: usize,
        /// Number of folds requested.
        n_folds: usize,
    },

    /// The spatial grid produced fewer occupied blocks than folds.
    #[error("only {n_blocks} occupied blocks for {n_folds} folds; decrease block range")]
    TooFewBlocks {
        /// Number of distinct occupied blocks.
        n_blocks: usize,
        /// Number of folds requested.
        n_folds: usize,
    },

    /// The prediction-domain polygon cannot support distance sampling.
    #[error("degenerate prediction domain: {reason}")]
    DegenerateDomain {
        /// Human-readable description of the geometric defect.
        reason: String,
    },

    /// Grid sampling of the domain polygon produced no interior points.
    #[error("domain sampling produced no points inside the polygon")]
    EmptyDomainSample,

    /// Plan construction failed after valid inputs.
    #[error("plan construction failed: {reason}")]
    PlanConstruction {
        /// Human-readable description of the failure.
        reason: String,
    },
}
