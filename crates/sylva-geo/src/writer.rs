//! JSON and CSV result writers for evaluation, tuning, and prediction.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sylva_rf::RankedFeature;
use sylva_tune::TuneResult;
use tracing::{debug, info, instrument};

use crate::error::GeoError;

/// A validated run name, restricted to `[a-zA-Z0-9_-]+` so it can be
/// embedded in file names.
#[derive(Debug, Clone)]
pub struct RunName(String);

impl RunName {
    /// Validate a run name.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidRunName`] on characters outside
    /// `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, GeoError> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(GeoError::InvalidRunName { name });
        }
        Ok(Self(name))
    }

    /// The validated name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Writes pipeline results to JSON and CSV files.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{run}_evaluate.json`, `{run}_tune.json`,
/// `{run}_archive.csv`, `{run}_predict.json`, `{run}_model.bin`, and
/// `{run}_surface.tif`.
pub struct ResultWriter {
    output_dir: PathBuf,
    run: RunName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and run name.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::OutputDirCreate`] if the directory cannot be
    /// created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), run = %run))]
    pub fn new(output_dir: &Path, run: RunName) -> Result<Self, GeoError> {
        fs::create_dir_all(output_dir).map_err(|e| GeoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            run,
        })
    }

    /// Write an evaluation result to `{run}_evaluate.json`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_evaluation(
        &self,
        strategy: &str,
        metric: &str,
        fold_scores: &[f64],
        score_mean: f64,
        score_std: f64,
        match_stat: Option<f64>,
        importances: &[RankedFeature],
    ) -> Result<(), GeoError> {
        let path = self
            .output_dir
            .join(format!("{}_evaluate.json", self.run.as_str()));

        let features: Vec<FeatureEntry> = importances
            .iter()
            .map(|f| FeatureEntry {
                name: &f.name,
                importance: f.importance,
                rank: f.rank,
            })
            .collect();

        let artifact = EvaluateArtifact {
            run: self.run.as_str(),
            strategy,
            metric,
            fold_scores,
            score_mean,
            score_std,
            match_stat,
            feature_importances: features,
        };
        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), "evaluation result written");
        Ok(())
    }

    /// Write a tuning result to `{run}_tune.json` and its trial archive
    /// to `{run}_archive.csv`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::WriteFile`] if either file cannot be written.
    #[instrument(skip_all)]
    pub fn write_tuning(&self, result: &TuneResult) -> Result<(), GeoError> {
        let json_path = self
            .output_dir
            .join(format!("{}_tune.json", self.run.as_str()));
        let best = result.best_params();
        let artifact = TuneArtifact {
            run: self.run.as_str(),
            metric: result.metric().to_string(),
            best_combo_index: best.combo_index,
            best_mtry: best.mtry,
            best_min_node_size: best.min_node_size,
            best_score: result.best_score(),
            n_models: result.n_models(),
        };
        self.write_json(&json_path, &artifact)?;

        let csv_path = self.archive_path();
        let mut wtr = csv::Writer::from_path(&csv_path).map_err(|e| GeoError::CsvWrite {
            path: csv_path.clone(),
            source: e,
        })?;
        for record in result.archive() {
            wtr.serialize(record).map_err(|e| GeoError::CsvWrite {
                path: csv_path.clone(),
                source: e,
            })?;
        }
        wtr.flush().map_err(|e| GeoError::WriteFile {
            path: csv_path.clone(),
            source: e,
        })?;

        info!(path = %json_path.display(), n_trials = result.archive().len(), "tuning result written");
        Ok(())
    }

    /// Write a surface-prediction summary to `{run}_predict.json`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_prediction_summary(
        &self,
        n_cells: usize,
        n_predicted: usize,
        surface_path: &Path,
    ) -> Result<(), GeoError> {
        let path = self
            .output_dir
            .join(format!("{}_predict.json", self.run.as_str()));
        let artifact = PredictArtifact {
            run: self.run.as_str(),
            n_cells,
            n_predicted,
            n_nodata: n_cells - n_predicted,
            surface: surface_path.display().to_string(),
        };
        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), "prediction summary written");
        Ok(())
    }

    /// Path for the serialized model binary.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_model.bin", self.run.as_str()))
    }

    /// Path for the prediction surface GeoTIFF.
    #[must_use]
    pub fn surface_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_surface.tif", self.run.as_str()))
    }

    /// Path for the tuning trial archive CSV.
    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_archive.csv", self.run.as_str()))
    }

    fn write_json<T: Serialize>(&self, path: &Path, artifact: &T) -> Result<(), GeoError> {
        let json = serde_json::to_string_pretty(artifact).expect("serialization cannot fail");
        fs::write(path, &json).map_err(|e| GeoError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct EvaluateArtifact<'a> {
    run: &'a str,
    strategy: &'a str,
    metric: &'a str,
    fold_scores: &'a [f64],
    score_mean: f64,
    score_std: f64,
    match_stat: Option<f64>,
    feature_importances: Vec<FeatureEntry<'a>>,
}

#[derive(Serialize)]
struct FeatureEntry<'a> {
    name: &'a str,
    importance: f64,
    rank: usize,
}

#[derive(Serialize)]
struct TuneArtifact<'a> {
    run: &'a str,
    metric: String,
    best_combo_index: usize,
    best_mtry: Option<usize>,
    best_min_node_size: Option<usize>,
    best_score: f64,
    n_models: usize,
}

#[derive(Serialize)]
struct PredictArtifact<'a> {
    run: &'a str,
    n_cells: usize,
    n_predicted: usize,
    n_nodata: usize,
    surface: String,
}
