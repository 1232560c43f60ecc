//! Spatial block cross-validation.

use std::collections::HashMap;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument, warn};

use crate::error::CvError;
use crate::plan::{Fold, ResamplingPlan, Strategy, check_coords};

/// Spatial block cross-validation.
///
/// Observations are tiled into square blocks of side `block_range`
/// (map units); whole blocks are assigned round-robin to folds so that
/// nearby observations never straddle a train/test boundary.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | `seed` | 42 |
#[derive(Debug, Clone)]
pub struct SpatialBlockCv {
    n_folds: usize,
    block_range: f64,
    seed: u64,
}

impl SpatialBlockCv {
    /// Create a block CV with `n_folds` folds and square blocks of
    /// side `block_range`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CvError::InvalidFoldCount`] | `n_folds < 2` |
    /// | [`CvError::InvalidBlockRange`] | `block_range` not positive and finite |
    pub fn new(n_folds: usize, block_range: f64) -> Result<Self, CvError> {
        if n_folds < 2 {
            return Err(CvError::InvalidFoldCount(n_folds));
        }
        if !block_range.is_finite() || block_range <= 0.0 {
            return Err(CvError::InvalidBlockRange(block_range));
        }
        Ok(Self {
            n_folds,
            block_range,
            seed: 42,
        })
    }

    /// Set the block-shuffle seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of folds.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Block side length in map units.
    #[must_use]
    pub fn block_range(&self) -> f64 {
        self.block_range
    }

    /// Assign observations at `coords` to spatially blocked folds.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CvError::EmptyObservations`] | no coordinates supplied |
    /// | [`CvError::NonFiniteCoordinate`] | a coordinate is NaN or infinite |
    /// | [`CvError::TooFewObservations`] | fewer observations than folds |
    /// | [`CvError::TooFewBlocks`] | fewer occupied blocks than folds |
    #[instrument(skip_all, fields(n_folds = self.n_folds, block_range = self.block_range, n = coords.len()))]
    pub fn split(&self, coords: &[(f64, f64)]) -> Result<ResamplingPlan, CvError> {
        check_coords(coords)?;
        if coords.len() < self.n_folds {
            return Err(CvError::TooFewObservations {
                n_observations: coords.len(),
                n_folds: self.n_folds,
            });
        }

        let (min_x, min_y) = coords.iter().fold((f64::INFINITY, f64::INFINITY), |acc, &(x, y)| {
            (acc.0.min(x), acc.1.min(y))
        });

        // Group observation indices by block cell.
        let mut blocks: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (i, &(x, y)) in coords.iter().enumerate() {
            let col = ((x - min_x) / self.block_range).floor() as i64;
            let row = ((y - min_y) / self.block_range).floor() as i64;
            blocks.entry((col, row)).or_default().push(i);
        }

        if blocks.len() < self.n_folds {
            return Err(CvError::TooFewBlocks {
                n_blocks: blocks.len(),
                n_folds: self.n_folds,
            });
        }

        // Deterministic block order before the shuffle.
        let mut block_cells: Vec<(i64, i64)> = blocks.keys().copied().collect();
        block_cells.sort_unstable();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        block_cells.shuffle(&mut rng);

        let mut test_sets: Vec<Vec<usize>> = vec![Vec::new(); self.n_folds];
        for (b, cell) in block_cells.iter().enumerate() {
            test_sets[b % self.n_folds].extend(&blocks[cell]);
        }

        let largest = test_sets.iter().map(Vec::len).max().unwrap_or(0);
        if largest * 2 > coords.len() {
            warn!(
                largest_fold = largest,
                "one fold holds over half the observations; consider a smaller block range"
            );
        }

        let folds = test_sets
            .into_iter()
            .map(|test| {
                let mut in_test = vec![false; coords.len()];
                for &i in &test {
                    in_test[i] = true;
                }
                let train = (0..coords.len()).filter(|&i| !in_test[i]).collect();
                Fold { train, test }
            })
            .collect();

        debug!(n_blocks = block_cells.len(), "block assignment complete");
        ResamplingPlan::new_partition(Strategy::SpatialBlock, coords.len(), folds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Four clusters of 5 points each, cluster centers 100 units apart.
    fn clustered_coords() -> Vec<(f64, f64)> {
        let centers = [(0.0, 0.0), (100.0, 0.0), (0.0, 100.0), (100.0, 100.0)];
        let mut coords = Vec::new();
        for &(cx, cy) in &centers {
            for k in 0..5 {
                coords.push((cx + k as f64 * 0.5, cy + k as f64 * 0.3));
            }
        }
        coords
    }

    #[test]
    fn clusters_stay_together() {
        let coords = clustered_coords();
        let plan = SpatialBlockCv::new(4, 10.0).unwrap().split(&coords).unwrap();
        assert_eq!(plan.n_folds(), 4);
        // Each cluster of 5 lands in exactly one test set.
        for fold in plan.folds() {
            assert_eq!(fold.test.len() % 5, 0);
        }
    }

    #[test]
    fn test_sets_partition_observations() {
        let coords = clustered_coords();
        let plan = SpatialBlockCv::new(2, 10.0).unwrap().split(&coords).unwrap();
        let mut all: Vec<usize> = plan.folds().iter().flat_map(|f| f.test.clone()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..coords.len()).collect::<Vec<_>>());
    }

    #[test]
    fn too_few_blocks_rejected() {
        // All 20 points fit in one giant block.
        let coords = clustered_coords();
        let err = SpatialBlockCv::new(4, 1000.0).unwrap().split(&coords).unwrap_err();
        assert!(matches!(err, CvError::TooFewBlocks { n_blocks: 1, n_folds: 4 }));
    }

    #[test]
    fn invalid_parameters_rejected() {
        assert!(matches!(
            SpatialBlockCv::new(1, 10.0).unwrap_err(),
            CvError::InvalidFoldCount(1)
        ));
        assert!(matches!(
            SpatialBlockCv::new(3, 0.0).unwrap_err(),
            CvError::InvalidBlockRange(_)
        ));
        assert!(matches!(
            SpatialBlockCv::new(3, f64::NAN).unwrap_err(),
            CvError::InvalidBlockRange(_)
        ));
    }

    #[test]
    fn non_finite_coordinate_rejected() {
        let coords = vec![(0.0, 0.0), (f64::NAN, 1.0), (2.0, 2.0)];
        let err = SpatialBlockCv::new(2, 1.0).unwrap().split(&coords).unwrap_err();
        assert!(matches!(err, CvError::NonFiniteCoordinate { index: 1 }));
    }

    #[test]
    fn same_seed_same_assignment() {
        let coords = clustered_coords();
        let strategy = SpatialBlockCv::new(2, 10.0).unwrap().with_seed(3);
        let a = strategy.split(&coords).unwrap();
        let b = strategy.split(&coords).unwrap();
        for (fa, fb) in a.folds().iter().zip(b.folds()) {
            assert_eq!(fa.test, fb.test);
        }
    }
}
