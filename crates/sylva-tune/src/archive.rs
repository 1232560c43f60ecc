//! Trial archive: one record per fitted model.

use serde::Serialize;

/// Score of a single fitted model during the grid search.
#[derive(Debug, Clone, Serialize)]
pub struct TrialRecord {
    /// Grid combination this trial belongs to.
    pub combo_index: usize,
    /// Mtry used, or `None` when the base value was kept.
    pub mtry: Option<usize>,
    /// Minimum node size used, or `None` when the base value was kept.
    pub min_node_size: Option<usize>,
    /// Fold index within the resampling plan.
    pub fold: usize,
    /// Metric score on the fold's test set.
    pub score: f64,
}

/// Mean score of one grid combination across folds.
#[derive(Debug, Clone, Serialize)]
pub struct ComboScore {
    /// Grid combination index.
    pub combo_index: usize,
    /// Mean test score across folds.
    pub mean_score: f64,
    /// Number of folds aggregated.
    pub n_folds: usize,
}

/// Aggregate an archive into per-combination mean scores, in
/// combination order.
#[must_use]
pub fn mean_scores(archive: &[TrialRecord], n_combinations: usize) -> Vec<ComboScore> {
    let mut sums = vec![(0.0, 0usize); n_combinations];
    for record in archive {
        if record.combo_index < n_combinations {
            let entry = &mut sums[record.combo_index];
            entry.0 += record.score;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .enumerate()
        .map(|(combo_index, (total, n_folds))| ComboScore {
            combo_index,
            mean_score: if n_folds == 0 { f64::NAN } else { total / n_folds as f64 },
            n_folds,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(combo_index: usize, fold: usize, score: f64) -> TrialRecord {
        TrialRecord {
            combo_index,
            mtry: Some(2),
            min_node_size: Some(5),
            fold,
            score,
        }
    }

    #[test]
    fn means_across_folds() {
        let archive = vec![
            record(0, 0, 1.0),
            record(0, 1, 3.0),
            record(1, 0, 2.0),
            record(1, 1, 2.0),
        ];
        let scores = mean_scores(&archive, 2);
        assert_eq!(scores.len(), 2);
        assert!((scores[0].mean_score - 2.0).abs() < 1e-12);
        assert!((scores[1].mean_score - 2.0).abs() < 1e-12);
        assert_eq!(scores[0].n_folds, 2);
    }

    #[test]
    fn missing_combo_yields_nan() {
        let archive = vec![record(0, 0, 1.0)];
        let scores = mean_scores(&archive, 2);
        assert!(scores[1].mean_score.is_nan());
        assert_eq!(scores[1].n_folds, 0);
    }
}
