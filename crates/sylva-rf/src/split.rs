use rand::Rng;

use crate::node::{FeatureIndex, Variance};

/// Sum of squared deviations from the mean, from running sums.
///
/// `SSE = Σy² - (Σy)²/n`, clamped at zero to absorb floating-point
/// cancellation on near-constant targets.
pub(crate) fn sse_from_sums(sum: f64, sum_sq: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    (sum_sq - sum * sum / n as f64).max(0.0)
}

/// Target variance (mean squared deviation) of a node.
pub(crate) fn node_variance(sum: f64, sum_sq: f64, n: usize) -> Variance {
    if n == 0 {
        return Variance::new(0.0);
    }
    Variance::new(sse_from_sums(sum, sum_sq, n) / n as f64)
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    /// Feature used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold value.
    pub(crate) threshold: f64,
    /// Decrease in sum of squared errors from this split.
    pub(crate) sse_decrease: f64,
    /// Sample indices going to the left child.
    pub(crate) left_indices: Vec<usize>,
    /// Sample indices going to the right child.
    pub(crate) right_indices: Vec<usize>,
    /// Number of samples in the left child.
    pub(crate) n_left: usize,
    /// Number of samples in the right child.
    pub(crate) n_right: usize,
}

/// Find the best variance-reduction split among a random subset of features.
///
/// For each of `mtry` randomly chosen features, sorts the `(value, target)`
/// pairs, scans left-to-right with incremental sum and sum-of-squares
/// updates, and tracks the globally best split by SSE decrease.
///
/// Returns `None` when no valid split exists (all values identical, or
/// every boundary would violate `min_node_size`).
///
/// # Column-major layout
///
/// `features` is column-major: `features[feature_idx][sample_idx]`.
/// `sample_indices` are indices into these inner Vecs.
pub(crate) fn find_best_split(
    features: &[Vec<f64>],
    targets: &[f64],
    sample_indices: &[usize],
    mtry: usize,
    min_node_size: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_features = features.len();
    let n_samples = sample_indices.len();

    if n_samples < 2 || n_features == 0 {
        return None;
    }

    // Parent sums.
    let mut parent_sum = 0.0f64;
    let mut parent_sum_sq = 0.0f64;
    for &si in sample_indices {
        parent_sum += targets[si];
        parent_sum_sq += targets[si] * targets[si];
    }
    let parent_sse = sse_from_sums(parent_sum, parent_sum_sq, n_samples);

    // Partial Fisher-Yates: shuffle only the first `mtry` positions.
    let mut feature_order: Vec<usize> = (0..n_features).collect();
    let take = mtry.min(n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        feature_order.swap(i, j);
    }
    let selected_features = &feature_order[..take];

    let mut best_decrease = f64::NEG_INFINITY;
    let mut best: Option<(FeatureIndex, f64)> = None;

    for &feat_idx in selected_features {
        let feat_col = &features[feat_idx];

        // Collect (value, sample_index) pairs for this feature.
        let mut sorted: Vec<(f64, usize)> = sample_indices
            .iter()
            .map(|&si| (feat_col[si], si))
            .collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        // Incremental scan: left grows from empty, right shrinks from full.
        let mut left_sum = 0.0f64;
        let mut left_sum_sq = 0.0f64;

        for i in 0..(n_samples - 1) {
            let (val_i, si) = sorted[i];
            let y = targets[si];
            left_sum += y;
            left_sum_sq += y * y;

            let n_left = i + 1;
            let n_right = n_samples - n_left;

            // Skip if next value is identical (no valid boundary here).
            let val_next = sorted[i + 1].0;
            if val_i == val_next {
                continue;
            }

            if n_left < min_node_size || n_right < min_node_size {
                continue;
            }

            let left_sse = sse_from_sums(left_sum, left_sum_sq, n_left);
            let right_sse =
                sse_from_sums(parent_sum - left_sum, parent_sum_sq - left_sum_sq, n_right);
            let decrease = parent_sse - left_sse - right_sse;

            if decrease > best_decrease {
                best_decrease = decrease;
                let threshold = (val_i + val_next) / 2.0;
                best = Some((FeatureIndex::new(feat_idx), threshold));
            }
        }
    }

    let (best_feature, threshold) = best?;

    // Partition sample_indices into left/right.
    let feat_col = &features[best_feature.index()];
    let mut left_indices = Vec::with_capacity(n_samples / 2);
    let mut right_indices = Vec::with_capacity(n_samples / 2);
    for &si in sample_indices {
        if feat_col[si] <= threshold {
            left_indices.push(si);
        } else {
            right_indices.push(si);
        }
    }
    let n_left = left_indices.len();
    let n_right = right_indices.len();

    Some(SplitResult {
        feature: best_feature,
        threshold,
        sse_decrease: best_decrease,
        left_indices,
        right_indices,
        n_left,
        n_right,
    })
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::{find_best_split, node_variance, sse_from_sums};

    #[test]
    fn sse_constant_targets_is_zero() {
        // Four identical values: Σy = 20, Σy² = 100, n = 4.
        let sse = sse_from_sums(20.0, 100.0, 4);
        assert!(sse.abs() < 1e-10, "sse = {sse}");
    }

    #[test]
    fn sse_matches_direct_computation() {
        let ys = [1.0, 2.0, 3.0, 4.0];
        let sum: f64 = ys.iter().sum();
        let sum_sq: f64 = ys.iter().map(|y| y * y).sum();
        let mean = sum / ys.len() as f64;
        let direct: f64 = ys.iter().map(|y| (y - mean).powi(2)).sum();
        assert!((sse_from_sums(sum, sum_sq, ys.len()) - direct).abs() < 1e-10);
    }

    #[test]
    fn variance_empty_node_is_zero() {
        assert!((node_variance(0.0, 0.0, 0).value() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn step_function_finds_correct_split() {
        // Feature 0: [1, 2, 3, 10, 11, 12], targets: [0, 0, 0, 5, 5, 5]
        let features = vec![vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0]];
        let targets = vec![0.0, 0.0, 0.0, 5.0, 5.0, 5.0];
        let sample_indices: Vec<usize> = (0..6).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let split = find_best_split(&features, &targets, &sample_indices, 1, 1, &mut rng)
            .expect("should find a split");
        assert_eq!(split.feature.index(), 0);
        assert!(split.threshold > 3.0 && split.threshold < 10.0);
        assert_eq!(split.n_left, 3);
        assert_eq!(split.n_right, 3);
    }

    #[test]
    fn constant_feature_returns_none() {
        let features = vec![vec![5.0, 5.0, 5.0, 5.0]];
        let targets = vec![0.0, 0.0, 1.0, 1.0];
        let sample_indices: Vec<usize> = (0..4).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let result = find_best_split(&features, &targets, &sample_indices, 1, 1, &mut rng);
        assert!(result.is_none());
    }

    #[test]
    fn min_node_size_enforced() {
        // 2 samples, min_node_size = 2: each child would have only 1 sample.
        let features = vec![vec![1.0, 10.0]];
        let targets = vec![0.0, 1.0];
        let sample_indices: Vec<usize> = (0..2).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let result = find_best_split(&features, &targets, &sample_indices, 1, 2, &mut rng);
        assert!(result.is_none());
    }

    #[test]
    fn informative_feature_beats_noise() {
        // Feature 0 tracks the target exactly; feature 1 is constant noise.
        let features = vec![
            vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0],
            vec![0.5, 0.5, 0.5, 0.5, 0.5, 0.5],
        ];
        let targets = vec![1.0, 1.1, 0.9, 8.0, 8.2, 7.9];
        let sample_indices: Vec<usize> = (0..6).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let split = find_best_split(&features, &targets, &sample_indices, 2, 1, &mut rng)
            .expect("should find a split");
        assert_eq!(split.feature.index(), 0);
        assert!(split.sse_decrease > 0.0);
    }
}
