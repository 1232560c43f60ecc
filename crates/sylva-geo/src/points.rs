//! CSV point reader with full input validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::crs::Crs;
use crate::error::GeoError;

/// Observation points with coordinates and measured attributes.
#[derive(Debug, Clone)]
pub struct PointSet {
    crs: Crs,
    coords: Vec<(f64, f64)>,
    columns: Vec<String>,
    /// Row-major attribute values, one row per point.
    values: Vec<Vec<f64>>,
}

impl PointSet {
    /// The coordinate reference system the coordinates are expressed in.
    #[must_use]
    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// Number of points.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.coords.len()
    }

    /// Point coordinates in file order.
    #[must_use]
    pub fn coords(&self) -> &[(f64, f64)] {
        &self.coords
    }

    /// Names of the non-coordinate columns.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Attribute rows aligned with [`PointSet::coords`].
    #[must_use]
    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    /// Index of a named attribute column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Reads observation points from a CSV file.
///
/// Expected CSV format:
/// - Header row required, containing `x` and `y` coordinate columns
/// - Remaining columns are numeric attributes (target and covariates)
/// - All rows must have the same number of columns
///
/// The CRS is declared by the caller; CSV files carry no projection
/// metadata of their own.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`GeoError::FileNotFound`] | file doesn't exist or is unreadable |
/// | [`GeoError::CsvParse`] | malformed CSV record |
/// | [`GeoError::MissingColumn`] | no `x` or `y` column in the header |
/// | [`GeoError::DuplicateColumn`] | a header name appears twice |
/// | [`GeoError::EmptyDataset`] | zero data rows after the header |
/// | [`GeoError::InconsistentRowLength`] | row column count differs from header |
/// | [`GeoError::NonFiniteValue`] | cell is NaN, Inf, or unparseable |
pub struct PointReader {
    path: PathBuf,
    crs: Crs,
}

impl PointReader {
    /// Create a reader for the given CSV path, declaring its CRS.
    pub fn new(path: &Path, crs: Crs) -> Self {
        Self {
            path: path.to_path_buf(),
            crs,
        }
    }

    /// Read and validate the CSV file, returning a [`PointSet`].
    #[instrument(skip(self), fields(path = %self.path.display(), crs = %self.crs))]
    pub fn read(&self) -> Result<PointSet, GeoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| GeoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) lets our own InconsistentRowLength check fire
        // instead of a low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let header = rdr
            .headers()
            .map_err(|e| GeoError::CsvParse {
                path: self.path.clone(),
                offset: e.position().map_or(0, |p| p.byte()),
                source: e,
            })?
            .clone();
        let expected_cols = header.len();

        let mut seen = HashSet::new();
        for name in header.iter() {
            if !seen.insert(name) {
                return Err(GeoError::DuplicateColumn {
                    path: self.path.clone(),
                    column: name.to_string(),
                });
            }
        }

        let x_col = self.require_column(&header, "x")?;
        let y_col = self.require_column(&header, "y")?;
        let attr_cols: Vec<usize> = (0..expected_cols)
            .filter(|&i| i != x_col && i != y_col)
            .collect();
        let columns: Vec<String> = attr_cols
            .iter()
            .map(|&i| header[i].to_string())
            .collect();
        debug!(expected_cols, n_attributes = columns.len(), "read CSV header");

        let mut coords = Vec::new();
        let mut values = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| GeoError::CsvParse {
                path: self.path.clone(),
                offset: e.position().map_or(0, |p| p.byte()),
                source: e,
            })?;

            if record.len() != expected_cols {
                return Err(GeoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            let parse = |col: usize| -> Result<f64, GeoError> {
                let raw = record.get(col).unwrap_or("");
                let value: f64 = raw.parse().map_err(|_| GeoError::NonFiniteValue {
                    path: self.path.clone(),
                    row_index,
                    column: header[col].to_string(),
                    raw: raw.to_string(),
                })?;
                if !value.is_finite() {
                    return Err(GeoError::NonFiniteValue {
                        path: self.path.clone(),
                        row_index,
                        column: header[col].to_string(),
                        raw: raw.to_string(),
                    });
                }
                Ok(value)
            };

            coords.push((parse(x_col)?, parse(y_col)?));
            let row: Result<Vec<f64>, GeoError> =
                attr_cols.iter().map(|&col| parse(col)).collect();
            values.push(row?);
        }

        if coords.is_empty() {
            return Err(GeoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(n_points = coords.len(), "points loaded");
        Ok(PointSet {
            crs: self.crs,
            coords,
            columns,
            values,
        })
    }

    fn require_column(&self, header: &csv::StringRecord, name: &str) -> Result<usize, GeoError> {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| GeoError::MissingColumn {
                path: self.path.clone(),
                column: name.to_string(),
            })
    }
}
