//! Random Forest regression training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::{Mtry, OobMode, RegressionForestConfig};
use crate::error::RfError;
use crate::importance::aggregate_importances;
use crate::oob::compute_oob;
use crate::result::{RegressionForestResult, TrainingMetadata};
use crate::tree::{RegressionTree, RegressionTreeConfig};

/// A fitted Random Forest regression ensemble.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegressionForest {
    pub(crate) trees: Vec<RegressionTree>,
    pub(crate) n_features: usize,
    pub(crate) feature_names: Vec<String>,
}

impl RegressionForest {
    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the number of features the model was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the feature column names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

/// Resolve `Mtry` to a concrete count.
pub(crate) fn resolve_mtry(mtry: Mtry, n_features: usize) -> Result<usize, RfError> {
    let resolved = match mtry {
        Mtry::Third => ((n_features as f64) / 3.0).ceil().max(1.0) as usize,
        Mtry::Sqrt => (n_features as f64).sqrt().ceil() as usize,
        Mtry::Fraction(f) => (n_features as f64 * f).ceil() as usize,
        Mtry::Fixed(n) => n,
        Mtry::All => n_features,
    };
    if resolved == 0 || resolved > n_features {
        return Err(RfError::InvalidMtry {
            mtry: resolved,
            n_features,
        });
    }
    Ok(resolved)
}

/// Generate a bootstrap sample and the out-of-bag indices.
fn bootstrap_sample(
    n_samples: usize,
    draw_count: usize,
    rng: &mut impl Rng,
) -> (Vec<usize>, Vec<usize>) {
    let mut in_bag = vec![false; n_samples];
    let mut bootstrap_indices = Vec::with_capacity(draw_count);
    for _ in 0..draw_count {
        let idx = rng.gen_range(0..n_samples);
        bootstrap_indices.push(idx);
        in_bag[idx] = true;
    }
    let oob_indices: Vec<usize> = (0..n_samples).filter(|&i| !in_bag[i]).collect();
    (bootstrap_indices, oob_indices)
}

/// Train the Random Forest regression ensemble.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train(
    config: &RegressionForestConfig,
    features: &[Vec<f64>],
    targets: &[f64],
    feature_names: &[String],
) -> Result<RegressionForestResult, RfError> {
    // --- Validate inputs ---
    if features.is_empty() {
        return Err(RfError::EmptyDataset);
    }
    let n_samples = features.len();
    let n_features = features[0].len();
    if n_features == 0 {
        return Err(RfError::ZeroFeatures);
    }
    if targets.len() != n_samples {
        return Err(RfError::TargetCountMismatch {
            n_samples,
            n_targets: targets.len(),
        });
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(RfError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        for (feature_index, &val) in row.iter().enumerate() {
            if !val.is_finite() {
                return Err(RfError::NonFiniteValue {
                    sample_index,
                    feature_index,
                });
            }
        }
    }
    for (sample_index, &y) in targets.iter().enumerate() {
        if !y.is_finite() {
            return Err(RfError::NonFiniteTarget { sample_index });
        }
    }

    // --- Validate config ---
    let mtry_resolved = resolve_mtry(config.mtry, n_features)?;

    if config.bootstrap_fraction <= 0.0 || config.bootstrap_fraction > 1.0 {
        return Err(RfError::InvalidBootstrapFraction {
            fraction: config.bootstrap_fraction,
        });
    }

    // The same limits the tree config enforces, checked here so a bad
    // value surfaces as an error before any worker thread touches it.
    if let Some(d) = config.max_depth
        && d == 0
    {
        return Err(RfError::InvalidMaxDepth { max_depth: 0 });
    }
    if config.min_samples_split < 2 {
        return Err(RfError::InvalidMinSamplesSplit {
            min_samples_split: config.min_samples_split,
        });
    }
    if config.min_node_size < 1 {
        return Err(RfError::InvalidMinNodeSize {
            min_node_size: config.min_node_size,
        });
    }

    let draw_count = ((n_samples as f64) * config.bootstrap_fraction).ceil() as usize;

    info!(
        n_trees = config.n_trees,
        n_samples,
        n_features,
        mtry = mtry_resolved,
        draw_count,
        "training regression forest"
    );

    // Generate per-tree seeds from a master RNG.
    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    // Capture config fields needed in the closure (avoids borrowing config
    // across the thread boundary).
    let max_depth = config.max_depth;
    let min_samples_split = config.min_samples_split;
    let min_node_size = config.min_node_size;

    // Parallel tree training.
    let tree_results: Vec<(RegressionTree, Vec<usize>)> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (bootstrap_indices, oob_indices) =
                bootstrap_sample(n_samples, draw_count, &mut rng);

            // Build bootstrap dataset: row-major features.
            let boot_features: Vec<Vec<f64>> = bootstrap_indices
                .iter()
                .map(|&i| features[i].clone())
                .collect();
            let boot_targets: Vec<f64> =
                bootstrap_indices.iter().map(|&i| targets[i]).collect();

            let tree_config = RegressionTreeConfig::new()
                .with_max_depth(max_depth)
                .with_min_samples_split(min_samples_split)
                .with_min_node_size(min_node_size)
                .with_max_features(Some(mtry_resolved))
                .with_seed(rng.r#gen());

            // All inputs are pre-validated — fit cannot fail on data errors.
            let tree = tree_config
                .fit(&boot_features, &boot_targets)
                .expect("tree fit should not fail on pre-validated data");

            (tree, oob_indices)
        })
        .collect();

    let mut trees = Vec::with_capacity(config.n_trees);
    let mut oob_indices_per_tree = Vec::with_capacity(config.n_trees);
    for (tree, oob) in tree_results {
        trees.push(tree);
        oob_indices_per_tree.push(oob);
    }

    // Aggregate feature importances.
    let per_tree_importances: Vec<Vec<f64>> =
        trees.iter().map(|t| t.feature_importances()).collect();
    let importances = aggregate_importances(&per_tree_importances, feature_names);

    debug!(n_trees_trained = trees.len(), "tree training complete");

    // OOB evaluation.
    let oob_score = if config.oob_mode == OobMode::Enabled {
        Some(compute_oob(&trees, features, targets, &oob_indices_per_tree)?)
    } else {
        None
    };

    let forest = RegressionForest {
        trees,
        n_features,
        feature_names: feature_names.to_vec(),
    };

    let metadata = TrainingMetadata {
        n_trees: config.n_trees,
        n_features,
        n_samples,
        mtry_resolved,
    };

    info!(
        oob_rmse = oob_score.as_ref().map(|s| s.rmse),
        "regression forest training complete"
    );

    Ok(RegressionForestResult::new(
        forest,
        importances,
        oob_score,
        oob_indices_per_tree,
        metadata,
    ))
}

#[cfg(test)]
mod tests {
    use crate::config::{Mtry, OobMode, RegressionForestConfig};
    use crate::predict::Predictor;

    /// Generate a simple piecewise-constant regression dataset.
    fn make_step_data() -> (Vec<Vec<f64>>, Vec<f64>, Vec<String>) {
        let mut features = Vec::new();
        let mut targets = Vec::new();
        // Plateau A: x in [0, 3] → y near 1
        for i in 0..20 {
            features.push(vec![i as f64 * 0.15, 0.5]);
            targets.push(1.0 + (i % 3) as f64 * 0.01);
        }
        // Plateau B: x in [10, 13] → y near 5
        for i in 0..20 {
            features.push(vec![10.0 + i as f64 * 0.15, 0.5]);
            targets.push(5.0 + (i % 3) as f64 * 0.01);
        }
        // Plateau C: x in [20, 23] → y near 9
        for i in 0..20 {
            features.push(vec![20.0 + i as f64 * 0.15, 0.5]);
            targets.push(9.0 + (i % 3) as f64 * 0.01);
        }
        let names = vec!["x0".to_string(), "x1".to_string()];
        (features, targets, names)
    }

    #[test]
    fn step_data_low_rmse() {
        let (features, targets, names) = make_step_data();
        let config = RegressionForestConfig::new(50)
            .unwrap()
            .with_mtry(Mtry::All)
            .with_min_node_size(1)
            .with_seed(42);
        let result = config.fit(&features, &targets, &names).unwrap();

        let predictions = result.forest().predict_rows(&features).unwrap();
        let rmse = crate::metrics::rmse(&predictions, &targets).unwrap();
        assert!(rmse < 0.5, "rmse = {rmse}");
    }

    #[test]
    fn oob_score_computed() {
        let (features, targets, names) = make_step_data();
        let config = RegressionForestConfig::new(50)
            .unwrap()
            .with_oob_mode(OobMode::Enabled)
            .with_seed(42);
        let result = config.fit(&features, &targets, &names).unwrap();

        let oob = result.oob_score().expect("OOB should be computed");
        assert!(oob.rmse < 2.0, "oob rmse = {}", oob.rmse);
        assert!(oob.n_oob_samples > 0);
    }

    #[test]
    fn feature_importances_sum_to_one() {
        let (features, targets, names) = make_step_data();
        let config = RegressionForestConfig::new(20).unwrap().with_seed(42);
        let result = config.fit(&features, &targets, &names).unwrap();

        let total: f64 = result.importances().iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-10, "total = {total}");
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (features, targets, names) = make_step_data();
        let result1 = RegressionForestConfig::new(10)
            .unwrap()
            .with_seed(99)
            .fit(&features, &targets, &names)
            .unwrap();
        let result2 = RegressionForestConfig::new(10)
            .unwrap()
            .with_seed(99)
            .fit(&features, &targets, &names)
            .unwrap();

        let preds1 = result1.forest().predict_rows(&features).unwrap();
        let preds2 = result2.forest().predict_rows(&features).unwrap();
        assert_eq!(preds1, preds2);
    }

    #[test]
    fn invalid_tree_count_error() {
        assert!(RegressionForestConfig::new(0).is_err());
    }

    #[test]
    fn empty_dataset_error() {
        let config = RegressionForestConfig::new(10).unwrap();
        let err = config.fit(&[], &[], &[]).unwrap_err();
        assert!(matches!(err, crate::RfError::EmptyDataset));
    }

    #[test]
    fn zero_min_node_size_error() {
        let (features, targets, names) = make_step_data();
        let err = RegressionForestConfig::new(10)
            .unwrap()
            .with_min_node_size(0)
            .fit(&features, &targets, &names)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::RfError::InvalidMinNodeSize { min_node_size: 0 }
        ));
    }

    #[test]
    fn zero_max_depth_error() {
        let (features, targets, names) = make_step_data();
        let err = RegressionForestConfig::new(10)
            .unwrap()
            .with_max_depth(Some(0))
            .fit(&features, &targets, &names)
            .unwrap_err();
        assert!(matches!(err, crate::RfError::InvalidMaxDepth { max_depth: 0 }));
    }

    #[test]
    fn min_samples_split_below_two_error() {
        let (features, targets, names) = make_step_data();
        let err = RegressionForestConfig::new(10)
            .unwrap()
            .with_min_samples_split(1)
            .fit(&features, &targets, &names)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::RfError::InvalidMinSamplesSplit { min_samples_split: 1 }
        ));
    }

    #[test]
    fn mtry_third_default_resolution() {
        // 6 features → ceil(6/3) = 2.
        let resolved = super::resolve_mtry(Mtry::Third, 6).unwrap();
        assert_eq!(resolved, 2);
        // 1 feature → max(1) = 1.
        assert_eq!(super::resolve_mtry(Mtry::Third, 1).unwrap(), 1);
    }

    #[test]
    fn mtry_fixed_out_of_range_error() {
        let err = super::resolve_mtry(Mtry::Fixed(10), 4).unwrap_err();
        assert!(matches!(
            err,
            crate::RfError::InvalidMtry { mtry: 10, n_features: 4 }
        ));
    }
}
