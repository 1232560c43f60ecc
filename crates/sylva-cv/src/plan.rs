//! Validated resampling plans shared by all strategies.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CvError;

/// Which strategy produced a resampling plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// Single random train/test partition.
    Holdout,
    /// Spatial block cross-validation.
    SpatialBlock,
    /// K-nearest-neighbour distance-matched cross-validation.
    KnnDistanceMatch,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Holdout => write!(f, "holdout"),
            Strategy::SpatialBlock => write!(f, "spatial block"),
            Strategy::KnnDistanceMatch => write!(f, "knn distance match"),
        }
    }
}

/// One train/test partition of the observation indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fold {
    /// Indices of the training observations.
    pub train: Vec<usize>,
    /// Indices of the held-out observations.
    pub test: Vec<usize>,
}

/// A validated sequence of train/test folds over `n_observations`.
///
/// Every fold is checked at construction: indices in range, train and
/// test disjoint and nonempty. For cross-validation strategies the test
/// sets additionally partition the full index range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResamplingPlan {
    strategy: Strategy,
    n_observations: usize,
    folds: Vec<Fold>,
    match_stat: Option<f64>,
}

impl ResamplingPlan {
    /// Build a plan from pre-assigned folds, validating the partition.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CvError::PlanConstruction`] | no folds, an empty side, an out-of-range or duplicated index, or train/test overlap |
    pub(crate) fn new(
        strategy: Strategy,
        n_observations: usize,
        folds: Vec<Fold>,
    ) -> Result<Self, CvError> {
        if folds.is_empty() {
            return Err(CvError::PlanConstruction {
                reason: "plan has no folds".to_string(),
            });
        }

        for (f, fold) in folds.iter().enumerate() {
            if fold.train.is_empty() || fold.test.is_empty() {
                return Err(CvError::PlanConstruction {
                    reason: format!("fold {f} has an empty train or test side"),
                });
            }
            let mut seen = vec![false; n_observations];
            for &i in fold.train.iter().chain(&fold.test) {
                if i >= n_observations {
                    return Err(CvError::PlanConstruction {
                        reason: format!("fold {f} references observation {i} of {n_observations}"),
                    });
                }
                if seen[i] {
                    return Err(CvError::PlanConstruction {
                        reason: format!("fold {f} assigns observation {i} twice"),
                    });
                }
                seen[i] = true;
            }
        }

        Ok(Self {
            strategy,
            n_observations,
            folds,
            match_stat: None,
        })
    }

    /// Like [`ResamplingPlan::new`], but additionally requires the test
    /// sets to partition the full observation range.
    pub(crate) fn new_partition(
        strategy: Strategy,
        n_observations: usize,
        folds: Vec<Fold>,
    ) -> Result<Self, CvError> {
        let mut covered = vec![false; n_observations];
        for (f, fold) in folds.iter().enumerate() {
            for &i in &fold.test {
                if i < n_observations && covered[i] {
                    return Err(CvError::PlanConstruction {
                        reason: format!("observation {i} held out in fold {f} and an earlier fold"),
                    });
                }
                if i < n_observations {
                    covered[i] = true;
                }
            }
        }
        if covered.iter().any(|c| !c) {
            return Err(CvError::PlanConstruction {
                reason: "test sets do not cover every observation".to_string(),
            });
        }
        Self::new(strategy, n_observations, folds)
    }

    pub(crate) fn set_match_stat(&mut self, stat: f64) {
        self.match_stat = Some(stat);
    }

    /// Strategy that produced this plan.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Number of observations the plan indexes into.
    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    /// The train/test folds.
    #[must_use]
    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }

    /// Number of folds.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }

    /// Distance-match statistic, if the strategy computes one.
    ///
    /// Only [`Strategy::KnnDistanceMatch`] plans carry this value.
    #[must_use]
    pub fn match_stat(&self) -> Option<f64> {
        self.match_stat
    }
}

/// Validate a coordinate array shared by the spatial strategies.
pub(crate) fn check_coords(coords: &[(f64, f64)]) -> Result<(), CvError> {
    if coords.is_empty() {
        return Err(CvError::EmptyObservations);
    }
    for (index, &(x, y)) in coords.iter().enumerate() {
        if !x.is_finite() || !y.is_finite() {
            return Err(CvError::NonFiniteCoordinate { index });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_plan_accepted() {
        let folds = vec![Fold {
            train: vec![0, 1, 2],
            test: vec![3, 4],
        }];
        let plan = ResamplingPlan::new(Strategy::Holdout, 5, folds).unwrap();
        assert_eq!(plan.n_folds(), 1);
        assert_eq!(plan.n_observations(), 5);
        assert!(plan.match_stat().is_none());
    }

    #[test]
    fn empty_fold_list_rejected() {
        let err = ResamplingPlan::new(Strategy::Holdout, 5, vec![]).unwrap_err();
        assert!(matches!(err, CvError::PlanConstruction { .. }));
    }

    #[test]
    fn overlapping_train_test_rejected() {
        let folds = vec![Fold {
            train: vec![0, 1, 2],
            test: vec![2, 3],
        }];
        let err = ResamplingPlan::new(Strategy::Holdout, 4, folds).unwrap_err();
        assert!(matches!(err, CvError::PlanConstruction { .. }));
    }

    #[test]
    fn out_of_range_index_rejected() {
        let folds = vec![Fold {
            train: vec![0, 1],
            test: vec![5],
        }];
        let err = ResamplingPlan::new(Strategy::Holdout, 3, folds).unwrap_err();
        assert!(matches!(err, CvError::PlanConstruction { .. }));
    }

    #[test]
    fn partition_requires_full_coverage() {
        let folds = vec![
            Fold {
                train: vec![2, 3],
                test: vec![0, 1],
            },
            Fold {
                train: vec![0, 1, 3],
                test: vec![2],
            },
        ];
        // Observation 3 is never held out.
        let err = ResamplingPlan::new_partition(Strategy::SpatialBlock, 4, folds).unwrap_err();
        assert!(matches!(err, CvError::PlanConstruction { .. }));
    }

    #[test]
    fn strategy_display() {
        assert_eq!(Strategy::Holdout.to_string(), "holdout");
        assert_eq!(Strategy::SpatialBlock.to_string(), "spatial block");
        assert_eq!(Strategy::KnnDistanceMatch.to_string(), "knn distance match");
    }
}
