//! Random holdout partitioning.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::error::CvError;
use crate::plan::{Fold, ResamplingPlan, Strategy};

/// Single random train/test split.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | `seed` | 42 |
#[derive(Debug, Clone)]
pub struct HoldoutSplit {
    ratio: f64,
    seed: u64,
}

impl HoldoutSplit {
    /// Create a holdout split keeping `ratio` of the observations for
    /// training.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CvError::InvalidRatio`] | `ratio` not strictly between 0 and 1 |
    pub fn new(ratio: f64) -> Result<Self, CvError> {
        if !ratio.is_finite() || ratio <= 0.0 || ratio >= 1.0 {
            return Err(CvError::InvalidRatio(ratio));
        }
        Ok(Self { ratio, seed: 42 })
    }

    /// Set the shuffle seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Training ratio.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Shuffle seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Partition `n_observations` into one train/test fold.
    ///
    /// The train side receives `round(ratio * n)` observations; both
    /// sides must end up nonempty.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CvError::EmptyObservations`] | `n_observations` is 0 |
    /// | [`CvError::TooFewObservations`] | either side would be empty |
    #[instrument(skip(self), fields(ratio = self.ratio, n = n_observations))]
    pub fn split(&self, n_observations: usize) -> Result<ResamplingPlan, CvError> {
        if n_observations == 0 {
            return Err(CvError::EmptyObservations);
        }

        let n_train = (self.ratio * n_observations as f64).round() as usize;
        if n_train == 0 || n_train >= n_observations {
            return Err(CvError::TooFewObservations {
                n_observations,
                n_folds: 2,
            });
        }

        let mut indices: Vec<usize> = (0..n_observations).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);

        let test = indices.split_off(n_train);
        debug!(n_train = indices.len(), n_test = test.len(), "holdout split");

        ResamplingPlan::new(
            Strategy::Holdout,
            n_observations,
            vec![Fold {
                train: indices,
                test,
            }],
        )
    }
}
