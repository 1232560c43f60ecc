//! Out-of-bag (OOB) evaluation for Random Forest regression.

use crate::error::RfError;
use crate::metrics::{r_squared, rmse};
use crate::tree::RegressionTree;

/// Out-of-bag evaluation result.
#[derive(Debug, Clone)]
pub struct OobScore {
    /// Root-mean-squared error of the OOB predictions.
    pub rmse: f64,
    /// Coefficient of determination of the OOB predictions.
    pub r_squared: f64,
    /// Number of samples that had at least one OOB tree.
    pub n_oob_samples: usize,
}

/// Compute out-of-bag predictions and error metrics.
///
/// For each sample, only trees where the sample was NOT in the bootstrap
/// are used for prediction (mean of tree outputs). Samples with no OOB
/// trees are skipped.
pub(crate) fn compute_oob(
    trees: &[RegressionTree],
    features: &[Vec<f64>],
    targets: &[f64],
    oob_indices_per_tree: &[Vec<usize>],
) -> Result<OobScore, RfError> {
    let n_samples = features.len();

    // Running prediction sums and tree counts per sample.
    let mut pred_sums = vec![0.0f64; n_samples];
    let mut tree_counts = vec![0usize; n_samples];

    for (tree_idx, oob_indices) in oob_indices_per_tree.iter().enumerate() {
        for &sample_idx in oob_indices {
            let pred = trees[tree_idx].predict(&features[sample_idx])?;
            pred_sums[sample_idx] += pred;
            tree_counts[sample_idx] += 1;
        }
    }

    let n_oob_samples = tree_counts.iter().filter(|&&c| c > 0).count();
    if n_oob_samples == 0 {
        return Err(RfError::OobEvaluationFailed {
            reason: "no sample has any OOB tree".to_string(),
        });
    }

    let mut oob_predictions = Vec::with_capacity(n_oob_samples);
    let mut oob_targets = Vec::with_capacity(n_oob_samples);
    for i in 0..n_samples {
        if tree_counts[i] > 0 {
            oob_predictions.push(pred_sums[i] / tree_counts[i] as f64);
            oob_targets.push(targets[i]);
        }
    }

    Ok(OobScore {
        rmse: rmse(&oob_predictions, &oob_targets)?,
        r_squared: r_squared(&oob_predictions, &oob_targets)?,
        n_oob_samples,
    })
}
