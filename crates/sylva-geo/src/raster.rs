//! In-memory multi-band raster with affine georeferencing.

use ndarray::Array2;

use crate::crs::Crs;
use crate::error::GeoError;

/// North-up affine transform mapping cell indices to world coordinates.
///
/// `origin_x`/`origin_y` name the top-left corner of the top-left cell;
/// `pixel_width` and `pixel_height` are positive cell sizes, with world
/// y decreasing as rows increase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// World x of the raster's top-left corner.
    pub origin_x: f64,
    /// World y of the raster's top-left corner.
    pub origin_y: f64,
    /// Cell width in map units.
    pub pixel_width: f64,
    /// Cell height in map units.
    pub pixel_height: f64,
}

impl GeoTransform {
    /// World coordinates of the center of cell `(col, row)`.
    #[must_use]
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y - (row as f64 + 0.5) * self.pixel_height,
        )
    }
}

/// One named raster band; NaN cells are nodata.
#[derive(Debug, Clone)]
pub struct Band {
    /// Band name, used to match model features.
    pub name: String,
    /// Cell values in `(row, col)` layout.
    pub data: Array2<f64>,
}

/// A georeferenced multi-band raster held in memory.
#[derive(Debug, Clone)]
pub struct Raster {
    width: usize,
    height: usize,
    transform: GeoTransform,
    crs: Crs,
    bands: Vec<Band>,
}

impl Raster {
    /// Assemble a raster, checking every band against the dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::BandShapeMismatch`] when a band's cell count
    /// differs from `width * height`.
    pub fn new(
        width: usize,
        height: usize,
        transform: GeoTransform,
        crs: Crs,
        bands: Vec<Band>,
    ) -> Result<Self, GeoError> {
        for band in &bands {
            if band.data.dim() != (height, width) {
                return Err(GeoError::BandShapeMismatch {
                    name: band.name.clone(),
                    expected: width * height,
                    got: band.data.len(),
                });
            }
        }
        Ok(Self {
            width,
            height,
            transform,
            crs,
            bands,
        })
    }

    /// Raster width in cells.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Raster height in cells.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total cell count per band.
    #[must_use]
    pub fn n_cells(&self) -> usize {
        self.width * self.height
    }

    /// The affine georeferencing transform.
    #[must_use]
    pub fn transform(&self) -> GeoTransform {
        self.transform
    }

    /// The coordinate reference system.
    #[must_use]
    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// All bands in storage order.
    #[must_use]
    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Band names in storage order.
    #[must_use]
    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    /// Look up a band by name.
    #[must_use]
    pub fn band(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name == name)
    }

    /// World-coordinate extent as `(min_x, min_y, max_x, max_y)`.
    #[must_use]
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        let t = self.transform;
        (
            t.origin_x,
            t.origin_y - self.height as f64 * t.pixel_height,
            t.origin_x + self.width as f64 * t.pixel_width,
            t.origin_y,
        )
    }

    /// The cell containing world point `(x, y)`, or `None` outside the
    /// extent.
    #[must_use]
    pub fn world_to_cell(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let t = self.transform;
        let col = (x - t.origin_x) / t.pixel_width;
        let row = (t.origin_y - y) / t.pixel_height;
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col.floor() as usize, row.floor() as usize);
        if col >= self.width || row >= self.height {
            return None;
        }
        Some((col, row))
    }

    /// Values of every band at the cell containing `(x, y)`.
    ///
    /// Returns `None` when the point lies outside the raster extent;
    /// nodata cells come back as NaN for the caller to handle.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> Option<Vec<f64>> {
        let (col, row) = self.world_to_cell(x, y)?;
        Some(self.bands.iter().map(|b| b.data[[row, col]]).collect())
    }
}
