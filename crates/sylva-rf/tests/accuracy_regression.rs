//! Accuracy regression tests for sylva-rf.
//!
//! These tests verify that algorithmic changes do not degrade Random Forest
//! regression accuracy on a deterministic synthetic dataset.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use sylva_rf::{Mtry, OobMode, Predictor, RegressionForestConfig, rmse};

// ---------------------------------------------------------------------------
// Helper: deterministic synthetic regression dataset
// ---------------------------------------------------------------------------

/// Generate a 300-sample, 10-feature regression dataset.
///
/// The response is `3·f0 + 2·f1 - f2` plus uniform noise in [0, 0.5].
/// Features 3-9 are pure noise in [0, 1].
fn make_regression() -> (Vec<Vec<f64>>, Vec<f64>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let n_samples = 300;
    let n_features = 10;

    let mut features = Vec::with_capacity(n_samples);
    let mut targets = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let row: Vec<f64> = (0..n_features).map(|_| rng.r#gen::<f64>()).collect();
        let y = 3.0 * row[0] + 2.0 * row[1] - row[2] + rng.r#gen::<f64>() * 0.5;
        features.push(row);
        targets.push(y);
    }
    let names: Vec<String> = (0..n_features).map(|f| format!("f{f}")).collect();
    (features, targets, names)
}

/// Standard deviation of the targets, the error of a mean-only model.
fn target_std(targets: &[f64]) -> f64 {
    let mean = targets.iter().sum::<f64>() / targets.len() as f64;
    (targets.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / targets.len() as f64).sqrt()
}

// ---------------------------------------------------------------------------
// a) training_error_beats_mean_model
// ---------------------------------------------------------------------------

/// In-sample RMSE must be well below the target standard deviation.
#[test]
fn training_error_beats_mean_model() {
    let (features, targets, names) = make_regression();
    let config = RegressionForestConfig::new(100)
        .unwrap()
        .with_min_node_size(2)
        .with_seed(42);
    let result = config.fit(&features, &targets, &names).unwrap();

    let predictions = result.forest().predict_rows(&features).unwrap();
    let err = rmse(&predictions, &targets).unwrap();
    let baseline = target_std(&targets);

    assert!(
        err < baseline * 0.5,
        "training rmse {err} not below half the baseline {baseline}"
    );
}

// ---------------------------------------------------------------------------
// b) oob_error_beats_mean_model
// ---------------------------------------------------------------------------

/// OOB RMSE must beat a mean-only model, and OOB R² must be positive.
#[test]
fn oob_error_beats_mean_model() {
    let (features, targets, names) = make_regression();
    let config = RegressionForestConfig::new(100)
        .unwrap()
        .with_oob_mode(OobMode::Enabled)
        .with_seed(42);
    let result = config.fit(&features, &targets, &names).unwrap();

    let oob = result.oob_score().expect("OOB should be computed");
    let baseline = target_std(&targets);

    assert!(oob.rmse < baseline, "oob rmse {} >= baseline {baseline}", oob.rmse);
    assert!(oob.r_squared > 0.0, "oob r² {} not positive", oob.r_squared);
    assert!(oob.n_oob_samples > 200, "n_oob = {}", oob.n_oob_samples);
}

// ---------------------------------------------------------------------------
// c) informative_features_rank_first
// ---------------------------------------------------------------------------

/// The three informative features must occupy the top importance ranks.
#[test]
fn informative_features_rank_first() {
    let (features, targets, names) = make_regression();
    let config = RegressionForestConfig::new(100)
        .unwrap()
        .with_mtry(Mtry::Third)
        .with_seed(42);
    let result = config.fit(&features, &targets, &names).unwrap();

    let top3: Vec<&str> = result
        .importances()
        .iter()
        .take(3)
        .map(|f| f.name.as_str())
        .collect();
    for informative in ["f0", "f1", "f2"] {
        assert!(
            top3.contains(&informative),
            "{informative} not in top-3 ranked features {top3:?}"
        );
    }
}

// ---------------------------------------------------------------------------
// d) identical_seeds_identical_models
// ---------------------------------------------------------------------------

/// Two runs with the same seed must produce bit-identical predictions.
#[test]
fn identical_seeds_identical_models() {
    let (features, targets, names) = make_regression();
    let fit = |seed: u64| {
        RegressionForestConfig::new(30)
            .unwrap()
            .with_seed(seed)
            .fit(&features, &targets, &names)
            .unwrap()
            .into_forest()
            .predict_rows(&features)
            .unwrap()
    };
    assert_eq!(fit(7), fit(7));
}

// ---------------------------------------------------------------------------
// e) more_trees_do_not_degrade
// ---------------------------------------------------------------------------

/// Growing the ensemble from 10 to 100 trees must not raise OOB RMSE much.
#[test]
fn more_trees_do_not_degrade() {
    let (features, targets, names) = make_regression();
    let oob_rmse = |n_trees: usize| {
        RegressionForestConfig::new(n_trees)
            .unwrap()
            .with_oob_mode(OobMode::Enabled)
            .with_seed(42)
            .fit(&features, &targets, &names)
            .unwrap()
            .oob_score()
            .expect("OOB computed")
            .rmse
    };
    let small = oob_rmse(10);
    let large = oob_rmse(100);
    assert!(
        large <= small * 1.1,
        "oob rmse grew from {small} (10 trees) to {large} (100 trees)"
    );
}
