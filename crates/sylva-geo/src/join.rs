//! Spatial join of raster covariates onto observation points.

use tracing::{info, instrument, warn};

use crate::error::GeoError;
use crate::points::PointSet;
use crate::raster::Raster;

/// Column names reserved for the coordinate axes.
pub(crate) const RESERVED_NAMES: [&str; 2] = ["x", "y"];

/// Observations with raster covariates attached.
///
/// Rows are points that fell inside the raster extent on valid data;
/// points outside the extent or on nodata cells are dropped.
#[derive(Debug, Clone)]
pub struct JoinedDataset {
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
    targets: Vec<f64>,
    coords: Vec<(f64, f64)>,
    n_dropped: usize,
    unused_columns: Vec<String>,
}

impl JoinedDataset {
    /// Covariate names, one per raster band used.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Covariate rows, aligned with [`JoinedDataset::targets`].
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Response values.
    #[must_use]
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Surviving point coordinates.
    #[must_use]
    pub fn coords(&self) -> &[(f64, f64)] {
        &self.coords
    }

    /// Number of surviving observations.
    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.targets.len()
    }

    /// Points dropped for falling outside the raster or on nodata.
    #[must_use]
    pub fn n_dropped(&self) -> usize {
        self.n_dropped
    }

    /// Point attribute columns other than the target, which the join
    /// leaves out of the covariate set.
    #[must_use]
    pub fn unused_columns(&self) -> &[String] {
        &self.unused_columns
    }
}

/// Sample every raster band at each point and pair the values with the
/// point's `target` attribute.
///
/// Bands named after a coordinate axis are stripped before sampling:
/// those names are reserved for the coordinates themselves. Points
/// outside the raster extent, or sitting on a nodata (NaN) cell in any
/// band, are dropped with a logged count. Covariates come from the
/// raster only; point attributes other than the target are left out,
/// logged, and reported via [`JoinedDataset::unused_columns`].
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`GeoError::CrsMismatch`] | raster and points disagree on CRS |
/// | [`GeoError::MissingTarget`] | `target` is not a point attribute |
/// | [`GeoError::NoPointsInExtent`] | every point was dropped |
#[instrument(skip_all, fields(target, n_points = points.n_points()))]
pub fn join(raster: &Raster, points: &PointSet, target: &str) -> Result<JoinedDataset, GeoError> {
    if raster.crs() != points.crs() {
        return Err(GeoError::CrsMismatch {
            left: raster.crs(),
            right: points.crs(),
        });
    }
    let target_idx = points
        .column_index(target)
        .ok_or_else(|| GeoError::MissingTarget {
            column: target.to_string(),
        })?;

    let unused_columns: Vec<String> = points
        .columns()
        .iter()
        .filter(|name| name.as_str() != target)
        .cloned()
        .collect();
    if !unused_columns.is_empty() {
        warn!(columns = ?unused_columns, "point attributes other than the target are not used");
    }

    let kept_bands: Vec<usize> = raster
        .bands()
        .iter()
        .enumerate()
        .filter(|(_, band)| {
            let reserved = RESERVED_NAMES.contains(&band.name.as_str());
            if reserved {
                warn!(band = %band.name, "band name is reserved for coordinates; band dropped");
            }
            !reserved
        })
        .map(|(i, _)| i)
        .collect();
    let feature_names: Vec<String> = kept_bands
        .iter()
        .map(|&i| raster.bands()[i].name.clone())
        .collect();

    let mut features = Vec::new();
    let mut targets = Vec::new();
    let mut coords = Vec::new();
    let mut n_dropped = 0;

    for (point_idx, &(x, y)) in points.coords().iter().enumerate() {
        let Some(sampled) = raster.sample(x, y) else {
            n_dropped += 1;
            continue;
        };
        let row: Vec<f64> = kept_bands.iter().map(|&i| sampled[i]).collect();
        if row.iter().any(|v| v.is_nan()) {
            n_dropped += 1;
            continue;
        }
        features.push(row);
        targets.push(points.values()[point_idx][target_idx]);
        coords.push((x, y));
    }

    if targets.is_empty() {
        return Err(GeoError::NoPointsInExtent);
    }
    if n_dropped > 0 {
        warn!(n_dropped, "points outside the raster or on nodata were dropped");
    }
    info!(
        n_observations = targets.len(),
        n_features = feature_names.len(),
        "spatial join complete"
    );

    Ok(JoinedDataset {
        feature_names,
        features,
        targets,
        coords,
        n_dropped,
        unused_columns,
    })
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use crate::crs::Crs;
    use crate::raster::{Band, GeoTransform};

    use super::*;

    fn make_raster(band_names: &[&str]) -> Raster {
        let transform = GeoTransform {
            origin_x: 0.0,
            origin_y: 40.0,
            pixel_width: 10.0,
            pixel_height: 10.0,
        };
        let bands = band_names
            .iter()
            .map(|&name| Band {
                name: name.to_string(),
                data: Array2::from_shape_fn((4, 4), |(row, col)| (row * 4 + col) as f64),
            })
            .collect();
        Raster::new(4, 4, transform, Crs::epsg(32632), bands).unwrap()
    }

    fn make_points(coords: Vec<(f64, f64)>, crs: Crs) -> PointSet {
        // Assemble via the CSV reader to stay on the public surface.
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "x,y,ndvi").unwrap();
        for (i, (x, y)) in coords.iter().enumerate() {
            writeln!(f, "{x},{y},{}", i as f64 * 0.1).unwrap();
        }
        f.flush().unwrap();
        crate::points::PointReader::new(f.path(), crs).read().unwrap()
    }

    #[test]
    fn join_attaches_band_values() {
        let raster = make_raster(&["elevation", "slope"]);
        let points = make_points(vec![(5.0, 35.0), (15.0, 35.0)], Crs::epsg(32632));
        let joined = join(&raster, &points, "ndvi").unwrap();

        assert_eq!(joined.n_observations(), 2);
        assert_eq!(joined.feature_names(), &["elevation", "slope"]);
        // Cell (0, 0) holds 0.0, cell (1, 0) holds 1.0 in both bands.
        assert_eq!(joined.features()[0], vec![0.0, 0.0]);
        assert_eq!(joined.features()[1], vec![1.0, 1.0]);
        assert_eq!(joined.targets(), &[0.0, 0.1]);
        assert_eq!(joined.n_dropped(), 0);
    }

    #[test]
    fn out_of_extent_points_dropped() {
        let raster = make_raster(&["elevation"]);
        let points = make_points(vec![(5.0, 35.0), (-100.0, 35.0)], Crs::epsg(32632));
        let joined = join(&raster, &points, "ndvi").unwrap();
        assert_eq!(joined.n_observations(), 1);
        assert_eq!(joined.n_dropped(), 1);
    }

    #[test]
    fn nodata_points_dropped() {
        let transform = GeoTransform {
            origin_x: 0.0,
            origin_y: 10.0,
            pixel_width: 10.0,
            pixel_height: 10.0,
        };
        let mut data = Array2::zeros((1, 2));
        data[[0, 1]] = f64::NAN;
        let raster = Raster::new(
            2,
            1,
            transform,
            Crs::epsg(32632),
            vec![Band {
                name: "elevation".to_string(),
                data,
            }],
        )
        .unwrap();

        let points = make_points(vec![(5.0, 5.0), (15.0, 5.0)], Crs::epsg(32632));
        let joined = join(&raster, &points, "ndvi").unwrap();
        assert_eq!(joined.n_observations(), 1);
        assert_eq!(joined.n_dropped(), 1);
    }

    #[test]
    fn reserved_band_names_stripped() {
        let raster = make_raster(&["elevation", "x"]);
        let points = make_points(vec![(5.0, 35.0)], Crs::epsg(32632));
        let joined = join(&raster, &points, "ndvi").unwrap();
        assert_eq!(joined.feature_names(), &["elevation"]);
        assert_eq!(joined.features()[0].len(), 1);
    }

    #[test]
    fn non_target_attributes_reported_unused() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "x,y,ndvi,plot_id,survey_year").unwrap();
        writeln!(f, "5.0,35.0,0.4,12.0,2019.0").unwrap();
        f.flush().unwrap();
        let points = crate::points::PointReader::new(f.path(), Crs::epsg(32632))
            .read()
            .unwrap();

        let raster = make_raster(&["elevation"]);
        let joined = join(&raster, &points, "ndvi").unwrap();
        assert_eq!(joined.unused_columns(), &["plot_id", "survey_year"]);
        assert_eq!(joined.feature_names(), &["elevation"]);

        let points = make_points(vec![(5.0, 35.0)], Crs::epsg(32632));
        let joined = join(&raster, &points, "ndvi").unwrap();
        assert!(joined.unused_columns().is_empty());
    }

    #[test]
    fn crs_mismatch_rejected() {
        let raster = make_raster(&["elevation"]);
        let points = make_points(vec![(5.0, 35.0)], Crs::epsg(4326));
        let err = join(&raster, &points, "ndvi").unwrap_err();
        assert!(matches!(err, GeoError::CrsMismatch { .. }));
    }

    #[test]
    fn missing_target_rejected() {
        let raster = make_raster(&["elevation"]);
        let points = make_points(vec![(5.0, 35.0)], Crs::epsg(32632));
        let err = join(&raster, &points, "biomass").unwrap_err();
        assert!(matches!(err, GeoError::MissingTarget { .. }));
    }

    #[test]
    fn all_points_outside_rejected() {
        let raster = make_raster(&["elevation"]);
        let points = make_points(vec![(-5.0, 35.0), (500.0, 35.0)], Crs::epsg(32632));
        let err = join(&raster, &points, "ndvi").unwrap_err();
        assert!(matches!(err, GeoError::NoPointsInExtent));
    }
}
