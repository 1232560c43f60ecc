//! Error types for geospatial I/O and the spatial join.

use std::path::PathBuf;

use crate::crs::Crs;

/// Errors from raster, point, and polygon I/O and the spatial join.
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    /// Returned when an input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the TIFF decoder fails on a raster file.
    #[error("cannot decode GeoTIFF {path}")]
    TiffDecode {
        /// Path to the raster file.
        path: PathBuf,
        /// Underlying TIFF error.
        source: tiff::TiffError,
    },

    /// Returned when the TIFF encoder fails while writing a surface.
    #[error("cannot encode GeoTIFF {path}")]
    TiffEncode {
        /// Path to the raster file.
        path: PathBuf,
        /// Underlying TIFF error.
        source: tiff::TiffError,
    },

    /// Returned when a raster uses a pixel format sylva cannot widen to f64.
    #[error("unsupported pixel format in {path}")]
    UnsupportedPixelFormat {
        /// Path to the raster file.
        path: PathBuf,
    },

    /// Returned when a required georeferencing tag is absent.
    #[error("GeoTIFF {path} is missing the {tag} tag")]
    MissingGeoTag {
        /// Path to the raster file.
        path: PathBuf,
        /// Name of the missing tag.
        tag: &'static str,
    },

    /// Returned when band names and decoded bands disagree in count.
    #[error("{path} decoded {got} bands but {expected} names were given")]
    BandNameCountMismatch {
        /// Path to the raster file.
        path: PathBuf,
        /// Number of names supplied.
        expected: usize,
        /// Number of bands decoded.
        got: usize,
    },

    /// Returned when band data does not match the raster dimensions.
    #[error("band {name} has {got} cells, expected {expected}")]
    BandShapeMismatch {
        /// Name of the offending band.
        name: String,
        /// Expected cell count (width × height).
        expected: usize,
        /// Actual cell count.
        got: usize,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when a CSV file contains a header but zero data rows.
    #[error("empty dataset (no data rows) in {path}")]
    EmptyDataset {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a data row has a different column count than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Expected number of columns (from header).
        expected: usize,
        /// Actual number of columns in this row.
        got: usize,
    },

    /// Returned when a cell value is NaN, Inf, or not a parseable float.
    #[error("non-finite value in {path}: row {row_index}, column \"{column}\", raw value \"{raw}\"")]
    NonFiniteValue {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Name of the offending column.
        column: String,
        /// The raw string value that failed to parse.
        raw: String,
    },

    /// Returned when a required column is absent from the header.
    #[error("missing column \"{column}\" in {path}")]
    MissingColumn {
        /// Path to the CSV file.
        path: PathBuf,
        /// Name of the missing column.
        column: String,
    },

    /// Returned when the same column name appears twice in the header.
    #[error("duplicate column \"{column}\" in {path}")]
    DuplicateColumn {
        /// Path to the CSV file.
        path: PathBuf,
        /// The duplicated column name.
        column: String,
    },

    /// Returned when the target column is absent from the point attributes.
    #[error("target column \"{column}\" is not a point attribute")]
    MissingTarget {
        /// Name of the requested target column.
        column: String,
    },

    /// Returned when an EPSG code cannot be stored in a GeoTIFF geokey.
    #[error("EPSG code {code} exceeds the geokey range (max 65535)")]
    UnsupportedCrsCode {
        /// The out-of-range EPSG code.
        code: u32,
    },

    /// Returned when two inputs carry different coordinate reference systems.
    #[error("CRS mismatch: {left} vs {right}; reproject inputs before running sylva")]
    CrsMismatch {
        /// CRS of the first input.
        left: Crs,
        /// CRS of the second input.
        right: Crs,
    },

    /// Returned when every point falls outside the raster or on nodata.
    #[error("no points overlap the raster extent with valid data")]
    NoPointsInExtent,

    /// Returned when a GeoJSON file cannot be interpreted as a polygon.
    #[error("cannot read polygon from {path}: {reason}")]
    GeoJsonParse {
        /// Path to the GeoJSON file.
        path: PathBuf,
        /// Human-readable description of the defect.
        reason: String,
    },

    /// Returned when a model feature has no matching raster band.
    #[error("model feature \"{name}\" has no matching raster band")]
    MissingBand {
        /// Name of the unmatched feature.
        name: String,
    },

    /// Returned when the model input width disagrees with the raster layout.
    #[error("model expects {expected} inputs but the raster layout provides {got}")]
    SurfaceInputMismatch {
        /// Inputs the model expects.
        expected: usize,
        /// Inputs the raster layout provides.
        got: usize,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a CSV artifact cannot be written.
    #[error("cannot write CSV file {path}")]
    CsvWrite {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the run name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid run name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidRunName {
        /// The invalid name.
        name: String,
    },

    /// Domain polygon construction failed.
    #[error(transparent)]
    Domain(#[from] sylva_cv::CvError),

    /// Model prediction failed while rendering a surface.
    #[error(transparent)]
    Predict(#[from] sylva_rf::RfError),
}
