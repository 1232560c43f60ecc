//! Regression task assembly and validation.

use thiserror::Error;
use tracing::{debug, instrument};

use crate::join::{JoinedDataset, RESERVED_NAMES};

/// Errors from task construction.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task has no observations.
    #[error("cannot build a task with zero observations")]
    EmptyTask,

    /// Features, targets, and coordinates disagree in length.
    #[error("rows ({n_rows}), targets ({n_targets}), and coords ({n_coords}) differ in length")]
    LengthMismatch {
        /// Number of feature rows.
        n_rows: usize,
        /// Number of target values.
        n_targets: usize,
        /// Number of coordinates.
        n_coords: usize,
    },

    /// A feature row has the wrong width.
    #[error("feature row {row} has {got} values, expected {expected}")]
    RowWidthMismatch {
        /// Zero-based row index.
        row: usize,
        /// Expected width (number of feature names).
        expected: usize,
        /// Actual width.
        got: usize,
    },

    /// A column name appears more than once (including the target).
    #[error("duplicate column name \"{name}\"")]
    DuplicateColumn {
        /// The duplicated name.
        name: String,
    },

    /// A column uses a name reserved for the coordinate axes.
    #[error("column name \"{name}\" is reserved for coordinates")]
    ReservedColumn {
        /// The reserved name.
        name: String,
    },
}

/// A validated regression task: covariate matrix, response, and point
/// coordinates.
///
/// Coordinates can optionally be exposed as two extra features named
/// after the axes, mirroring models that learn spatial trends directly.
#[derive(Debug, Clone)]
pub struct Task {
    target_name: String,
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
    targets: Vec<f64>,
    coords: Vec<(f64, f64)>,
    coords_as_features: bool,
}

impl Task {
    /// Build and validate a task from its raw parts.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TaskError::EmptyTask`] | zero observations |
    /// | [`TaskError::LengthMismatch`] | rows, targets, coords differ in length |
    /// | [`TaskError::RowWidthMismatch`] | a row width differs from the name count |
    /// | [`TaskError::DuplicateColumn`] | a name repeats, or collides with the target |
    /// | [`TaskError::ReservedColumn`] | a name is a coordinate axis |
    #[instrument(skip_all, fields(target = %target_name, n_rows = features.len()))]
    pub fn new(
        target_name: String,
        feature_names: Vec<String>,
        features: Vec<Vec<f64>>,
        targets: Vec<f64>,
        coords: Vec<(f64, f64)>,
    ) -> Result<Self, TaskError> {
        if features.is_empty() {
            return Err(TaskError::EmptyTask);
        }
        if features.len() != targets.len() || features.len() != coords.len() {
            return Err(TaskError::LengthMismatch {
                n_rows: features.len(),
                n_targets: targets.len(),
                n_coords: coords.len(),
            });
        }
        for (row, values) in features.iter().enumerate() {
            if values.len() != feature_names.len() {
                return Err(TaskError::RowWidthMismatch {
                    row,
                    expected: feature_names.len(),
                    got: values.len(),
                });
            }
        }

        for name in feature_names.iter().chain(std::iter::once(&target_name)) {
            if RESERVED_NAMES.contains(&name.as_str()) {
                return Err(TaskError::ReservedColumn { name: name.clone() });
            }
        }
        let mut seen = std::collections::HashSet::new();
        for name in feature_names.iter().chain(std::iter::once(&target_name)) {
            if !seen.insert(name.as_str()) {
                return Err(TaskError::DuplicateColumn { name: name.clone() });
            }
        }

        debug!(n_features = feature_names.len(), "task validated");
        Ok(Self {
            target_name,
            feature_names,
            features,
            targets,
            coords,
            coords_as_features: false,
        })
    }

    /// Build a task directly from a spatial join result.
    ///
    /// # Errors
    ///
    /// Same as [`Task::new`].
    pub fn from_joined(joined: &JoinedDataset, target_name: &str) -> Result<Self, TaskError> {
        Self::new(
            target_name.to_string(),
            joined.feature_names().to_vec(),
            joined.features().to_vec(),
            joined.targets().to_vec(),
            joined.coords().to_vec(),
        )
    }

    /// Expose the coordinates as two extra features.
    #[must_use]
    pub fn with_coords_as_features(mut self, coords_as_features: bool) -> Self {
        self.coords_as_features = coords_as_features;
        self
    }

    /// Name of the response column.
    #[must_use]
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Number of observations.
    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.targets.len()
    }

    /// Whether coordinates are exposed as features.
    #[must_use]
    pub fn coords_as_features(&self) -> bool {
        self.coords_as_features
    }

    /// Effective feature names, with the axis columns appended when
    /// coordinates are features.
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.feature_names.clone();
        if self.coords_as_features {
            names.extend(RESERVED_NAMES.iter().map(|&n| n.to_string()));
        }
        names
    }

    /// Effective feature matrix, with coordinates appended when they
    /// are features.
    #[must_use]
    pub fn feature_matrix(&self) -> Vec<Vec<f64>> {
        if !self.coords_as_features {
            return self.features.clone();
        }
        self.features
            .iter()
            .zip(&self.coords)
            .map(|(row, &(x, y))| {
                let mut extended = row.clone();
                extended.push(x);
                extended.push(y);
                extended
            })
            .collect()
    }

    /// Response values.
    #[must_use]
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Observation coordinates.
    #[must_use]
    pub fn coords(&self) -> &[(f64, f64)] {
        &self.coords
    }
}
