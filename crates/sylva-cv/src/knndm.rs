//! K-nearest-neighbour distance-matched cross-validation.
//!
//! Folds are chosen so that the distribution of nearest-neighbour
//! distances under leave-fold-out prediction resembles the distribution
//! of prediction-point-to-observation distances over the target domain.
//! Observations are clustered spatially with k-means, one cluster per
//! fold, and the resulting match quality is reported as a
//! 1-Wasserstein distance between the two distance distributions.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use crate::domain::Polygon;
use crate::error::CvError;
use crate::plan::{Fold, ResamplingPlan, Strategy, check_coords};

/// Number of quantiles used to compare distance distributions.
const N_QUANTILES: usize = 500;

/// Maximum Lloyd iterations per k-means restart.
const MAX_KMEANS_ITERATIONS: usize = 100;

/// Distance-matched cross-validation via spatial k-means folds.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | `n_domain_samples` | 1000 |
/// | `n_restarts` | 10 |
/// | `seed` | 42 |
#[derive(Debug, Clone)]
pub struct KnnDistanceMatch {
    n_folds: usize,
    n_domain_samples: usize,
    n_restarts: usize,
    seed: u64,
}

impl KnnDistanceMatch {
    /// Create a distance-matched CV with `n_folds` folds.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CvError::InvalidFoldCount`] | `n_folds < 2` |
    pub fn new(n_folds: usize) -> Result<Self, CvError> {
        if n_folds < 2 {
            return Err(CvError::InvalidFoldCount(n_folds));
        }
        Ok(Self {
            n_folds,
            n_domain_samples: 1000,
            n_restarts: 10,
            seed: 42,
        })
    }

    /// Set the target number of domain sample points.
    #[must_use]
    pub fn with_n_domain_samples(mut self, n_domain_samples: usize) -> Self {
        self.n_domain_samples = n_domain_samples.max(1);
        self
    }

    /// Set the number of k-means restarts.
    #[must_use]
    pub fn with_n_restarts(mut self, n_restarts: usize) -> Self {
        self.n_restarts = n_restarts.max(1);
        self
    }

    /// Set the random seed for sampling and clustering.
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

    /// Assign observations at `coords` to distance-matched folds over
    /// the prediction `domain`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CvError::EmptyObservations`] | no coordinates supplied |
    /// | [`CvError::NonFiniteCoordinate`] | a coordinate is NaN or infinite |
    /// | [`CvError::TooFewObservations`] | fewer observations than folds |
    /// | [`CvError::EmptyDomainSample`] | no grid sample falls inside the domain |
    /// | [`CvError::PlanConstruction`] | clustering cannot produce nonempty folds |
    #[instrument(skip_all, fields(n_folds = self.n_folds, n = coords.len()))]
    pub fn split(
        &self,
        coords: &[(f64, f64)],
        domain: &Polygon,
    ) -> Result<ResamplingPlan, CvError> {
        check_coords(coords)?;
        if coords.len() < self.n_folds {
            return Err(CvError::TooFewObservations {
                n_observations: coords.len(),
                n_folds: self.n_folds,
            });
        }

        let domain_points = sample_domain(domain, self.n_domain_samples)?;
        debug!(n_domain_points = domain_points.len(), "domain sampled");

        // Target distribution: distance from each domain point to its
        // nearest observation.
        let target_distances: Vec<f64> = domain_points
            .iter()
            .map(|&p| nearest_distance(p, coords))
            .collect();

        let assignment = best_clustering(coords, self.n_folds, self.n_restarts, self.seed)?;

        // Achieved distribution: distance from each observation to the
        // nearest observation outside its own fold.
        let cv_distances: Vec<f64> = coords
            .iter()
            .enumerate()
            .map(|(i, &p)| nearest_distance_excluding_fold(p, coords, &assignment, assignment[i]))
            .collect();

        let match_stat = wasserstein_1d(&cv_distances, &target_distances);
        info!(match_stat, "distance distributions compared");

        let folds = (0..self.n_folds)
            .map(|f| {
                let test: Vec<usize> =
                    (0..coords.len()).filter(|&i| assignment[i] == f).collect();
                let train: Vec<usize> =
                    (0..coords.len()).filter(|&i| assignment[i] != f).collect();
                Fold { train, test }
            })
            .collect();

        let mut plan =
            ResamplingPlan::new_partition(Strategy::KnnDistanceMatch, coords.len(), folds)?;
        plan.set_match_stat(match_stat);
        Ok(plan)
    }
}

/// Sample the domain polygon on a regular grid, keeping cell centers
/// that fall inside the polygon.
fn sample_domain(domain: &Polygon, n_target: usize) -> Result<Vec<(f64, f64)>, CvError> {
    let (min_x, min_y, max_x, max_y) = domain.bounding_box();
    let steps = (n_target as f64).sqrt().ceil() as usize;
    let dx = (max_x - min_x) / steps as f64;
    let dy = (max_y - min_y) / steps as f64;

    let mut points = Vec::new();
    for row in 0..steps {
        let y = min_y + (row as f64 + 0.5) * dy;
        for col in 0..steps {
            let x = min_x + (col as f64 + 0.5) * dx;
            if domain.contains(x, y) {
                points.push((x, y));
            }
        }
    }

    if points.is_empty() {
        return Err(CvError::EmptyDomainSample);
    }
    Ok(points)
}

fn squared_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}

/// Euclidean distance from `point` to the nearest coordinate.
fn nearest_distance(point: (f64, f64), coords: &[(f64, f64)]) -> f64 {
    coords
        .iter()
        .map(|&c| squared_distance(point, c))
        .fold(f64::INFINITY, f64::min)
        .sqrt()
}

/// Distance from `point` to the nearest observation not assigned to
/// `fold`.
fn nearest_distance_excluding_fold(
    point: (f64, f64),
    coords: &[(f64, f64)],
    assignment: &[usize],
    fold: usize,
) -> f64 {
    coords
        .iter()
        .zip(assignment)
        .filter(|&(_, &a)| a != fold)
        .map(|(&c, _)| squared_distance(point, c))
        .fold(f64::INFINITY, f64::min)
        .sqrt()
}

/// Run k-means with restarts and return the cluster assignment with the
/// lowest within-cluster sum of squares among restarts where every
/// cluster is nonempty.
fn best_clustering(
    coords: &[(f64, f64)],
    k: usize,
    n_restarts: usize,
    seed: u64,
) -> Result<Vec<usize>, CvError> {
    let mut master_rng = ChaCha8Rng::seed_from_u64(seed);
    let mut best: Option<(f64, Vec<usize>)> = None;

    for _ in 0..n_restarts {
        let restart_seed: u64 = master_rng.r#gen();
        if let Some((sse, assignment)) = run_kmeans(coords, k, restart_seed)
            && best.as_ref().is_none_or(|(best_sse, _)| sse < *best_sse)
        {
            best = Some((sse, assignment));
        }
    }

    match best {
        Some((sse, assignment)) => {
            debug!(sse, "clustering selected");
            Ok(assignment)
        }
        None => Err(CvError::PlanConstruction {
            reason: format!("k-means could not form {k} nonempty folds; observations may coincide"),
        }),
    }
}

/// One k-means restart: k-means++ seeding followed by Lloyd iterations.
///
/// Returns `None` when any cluster ends up empty.
fn run_kmeans(coords: &[(f64, f64)], k: usize, seed: u64) -> Option<(f64, Vec<usize>)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut centers = plus_plus_init(coords, k, &mut rng);
    let mut assignment = vec![0usize; coords.len()];

    for _ in 0..MAX_KMEANS_ITERATIONS {
        let mut changed = false;
        for (i, &p) in coords.iter().enumerate() {
            let nearest = centers
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    squared_distance(p, **a).total_cmp(&squared_distance(p, **b))
                })
                .map(|(c, _)| c)?;
            if assignment[i] != nearest {
                assignment[i] = nearest;
                changed = true;
            }
        }

        let mut sums = vec![(0.0, 0.0, 0usize); k];
        for (i, &(x, y)) in coords.iter().enumerate() {
            let entry = &mut sums[assignment[i]];
            entry.0 += x;
            entry.1 += y;
            entry.2 += 1;
        }
        if sums.iter().any(|&(_, _, n)| n == 0) {
            return None;
        }
        for (center, &(sx, sy, n)) in centers.iter_mut().zip(&sums) {
            *center = (sx / n as f64, sy / n as f64);
        }

        if !changed {
            break;
        }
    }

    let sse = coords
        .iter()
        .zip(&assignment)
        .map(|(&p, &a)| squared_distance(p, centers[a]))
        .sum();
    Some((sse, assignment))
}

/// K-means++ seeding: centers drawn with probability proportional to
/// squared distance from the nearest existing center.
fn plus_plus_init(coords: &[(f64, f64)], k: usize, rng: &mut ChaCha8Rng) -> Vec<(f64, f64)> {
    let mut centers = Vec::with_capacity(k);
    centers.push(coords[rng.gen_range(0..coords.len())]);

    while centers.len() < k {
        let weights: Vec<f64> = coords
            .iter()
            .map(|&p| {
                centers
                    .iter()
                    .map(|&c| squared_distance(p, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            // All points coincide with existing centers.
            centers.push(coords[rng.gen_range(0..coords.len())]);
            continue;
        }
        let mut draw = rng.r#gen::<f64>() * total;
        let mut chosen = coords.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            draw -= w;
            if draw <= 0.0 {
                chosen = i;
                break;
            }
        }
        centers.push(coords[chosen]);
    }
    centers
}

/// 1-Wasserstein distance between two empirical distributions, computed
/// by averaging absolute quantile differences.
fn wasserstein_1d(a: &[f64], b: &[f64]) -> f64 {
    let mut sorted_a = a.to_vec();
    let mut sorted_b = b.to_vec();
    sorted_a.sort_unstable_by(f64::total_cmp);
    sorted_b.sort_unstable_by(f64::total_cmp);

    let mut total = 0.0;
    for q in 0..N_QUANTILES {
        let p = (q as f64 + 0.5) / N_QUANTILES as f64;
        total += (quantile(&sorted_a, p) - quantile(&sorted_b, p)).abs();
    }
    total / N_QUANTILES as f64
}

/// Linearly interpolated quantile of a sorted sample.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = p * (n - 1) as f64;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_domain(side: f64) -> Polygon {
        Polygon::new(vec![(0.0, 0.0), (side, 0.0), (side, side), (0.0, side)]).unwrap()
    }

    /// Deterministic pseudo-uniform points in the unit square scaled
    /// by `side`.
    fn scattered_coords(n: usize, side: f64) -> Vec<(f64, f64)> {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        (0..n)
            .map(|_| (rng.r#gen::<f64>() * side, rng.r#gen::<f64>() * side))
            .collect()
    }

    #[test]
    fn produces_valid_partition_with_match_stat() {
        let coords = scattered_coords(60, 100.0);
        let plan = KnnDistanceMatch::new(5)
            .unwrap()
            .with_n_domain_samples(400)
            .split(&coords, &square_domain(100.0))
            .unwrap();

        assert_eq!(plan.n_folds(), 5);
        assert_eq!(plan.strategy(), Strategy::KnnDistanceMatch);
        let stat = plan.match_stat().expect("knndm plans carry a match stat");
        assert!(stat.is_finite() && stat >= 0.0);

        let mut all: Vec<usize> = plan.folds().iter().flat_map(|f| f.test.clone()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..coords.len()).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_same_plan() {
        let coords = scattered_coords(40, 50.0);
        let domain = square_domain(50.0);
        let strategy = KnnDistanceMatch::new(3).unwrap().with_seed(11);
        let a = strategy.split(&coords, &domain).unwrap();
        let b = strategy.split(&coords, &domain).unwrap();
        for (fa, fb) in a.folds().iter().zip(b.folds()) {
            assert_eq!(fa.test, fb.test);
        }
        assert_eq!(a.match_stat(), b.match_stat());
    }

    #[test]
    fn domain_sample_misses_concave_polygon() {
        // L-shape whose bounding-box center is outside the polygon;
        // with a single sample point the grid lands exactly there.
        let domain = Polygon::new(vec![
            (0.0, 0.0),
            (4.0, 0.0),
            (4.0, 1.0),
            (1.0, 1.0),
            (1.0, 4.0),
            (0.0, 4.0),
        ])
        .unwrap();
        let coords = scattered_coords(10, 4.0);
        let err = KnnDistanceMatch::new(2)
            .unwrap()
            .with_n_domain_samples(1)
            .split(&coords, &domain)
            .unwrap_err();
        assert!(matches!(err, CvError::EmptyDomainSample));
    }

    #[test]
    fn coincident_observations_rejected() {
        let coords = vec![(5.0, 5.0); 10];
        let err = KnnDistanceMatch::new(3)
            .unwrap()
            .split(&coords, &square_domain(10.0))
            .unwrap_err();
        assert!(matches!(err, CvError::PlanConstruction { .. }));
    }

    #[test]
    fn too_few_observations_rejected() {
        let coords = scattered_coords(3, 10.0);
        let err = KnnDistanceMatch::new(5)
            .unwrap()
            .split(&coords, &square_domain(10.0))
            .unwrap_err();
        assert!(matches!(err, CvError::TooFewObservations { .. }));
    }

    #[test]
    fn wasserstein_of_identical_samples_is_zero() {
        let sample = vec![1.0, 2.0, 3.0, 4.0];
        assert!(wasserstein_1d(&sample, &sample).abs() < 1e-12);
    }

    #[test]
    fn wasserstein_of_shifted_samples_is_the_shift() {
        let a = vec![0.0, 1.0, 2.0, 3.0];
        let b: Vec<f64> = a.iter().map(|v| v + 2.5).collect();
        assert!((wasserstein_1d(&a, &b) - 2.5).abs() < 1e-9);
    }
}
