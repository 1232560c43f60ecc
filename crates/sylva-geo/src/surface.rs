//! Wall-to-wall prediction surfaces.

use ndarray::Array2;
use sylva_rf::Predictor;
use tracing::{info, instrument};

use crate::error::GeoError;
use crate::raster::{Band, Raster};

enum InputSource {
    Band(usize),
    AxisX,
    AxisY,
}

/// Predict a response value for every raster cell.
///
/// `feature_names` fixes the model's input order; each name must match
/// a raster band, except the axis names `x`/`y` which draw from the
/// cell-center coordinates when `coords_as_features` is set. Cells with
/// nodata in any input band come back as NaN, and the output raster
/// shares the source's extent, resolution, and CRS exactly.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`GeoError::MissingBand`] | a feature name matches no band |
/// | [`GeoError::SurfaceInputMismatch`] | model input width disagrees |
/// | [`GeoError::Predict`] | the model rejected an input row |
#[instrument(skip_all, fields(width = raster.width(), height = raster.height(), n_inputs = feature_names.len()))]
pub fn predict_surface(
    model: &impl Predictor,
    raster: &Raster,
    feature_names: &[String],
    coords_as_features: bool,
) -> Result<Raster, GeoError> {
    let sources: Vec<InputSource> = feature_names
        .iter()
        .map(|name| {
            if coords_as_features {
                if name == "x" {
                    return Ok(InputSource::AxisX);
                }
                if name == "y" {
                    return Ok(InputSource::AxisY);
                }
            }
            raster
                .bands()
                .iter()
                .position(|b| &b.name == name)
                .map(InputSource::Band)
                .ok_or_else(|| GeoError::MissingBand { name: name.clone() })
        })
        .collect::<Result<_, _>>()?;

    if model.n_inputs() != sources.len() {
        return Err(GeoError::SurfaceInputMismatch {
            expected: model.n_inputs(),
            got: sources.len(),
        });
    }

    let mut output = Array2::from_elem((raster.height(), raster.width()), f64::NAN);
    let mut row_buf = vec![0.0; sources.len()];
    let mut n_valid = 0usize;

    for row in 0..raster.height() {
        for col in 0..raster.width() {
            let (x, y) = raster.transform().cell_center(col, row);
            let mut nodata = false;
            for (slot, source) in row_buf.iter_mut().zip(&sources) {
                *slot = match source {
                    InputSource::Band(i) => {
                        let v = raster.bands()[*i].data[[row, col]];
                        if v.is_nan() {
                            nodata = true;
                            break;
                        }
                        v
                    }
                    InputSource::AxisX => x,
                    InputSource::AxisY => y,
                };
            }
            if nodata {
                continue;
            }
            output[[row, col]] = model.predict_row(&row_buf)?;
            n_valid += 1;
        }
    }

    info!(n_valid, n_cells = raster.n_cells(), "surface predicted");
    Raster::new(
        raster.width(),
        raster.height(),
        raster.transform(),
        raster.crs(),
        vec![Band {
            name: "prediction".to_string(),
            data: output,
        }],
    )
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use sylva_rf::RfError;

    use crate::crs::Crs;
    use crate::raster::GeoTransform;

    use super::*;

    /// Predicts the sum of its inputs.
    struct SumModel {
        n_inputs: usize,
    }

    impl Predictor for SumModel {
        fn n_inputs(&self) -> usize {
            self.n_inputs
        }

        fn predict_row(&self, row: &[f64]) -> Result<f64, RfError> {
            if row.len() != self.n_inputs {
                return Err(RfError::PredictionFeatureMismatch {
                    expected: self.n_inputs,
                    got: row.len(),
                });
            }
            Ok(row.iter().sum())
        }
    }

    fn two_band_raster() -> Raster {
        let transform = GeoTransform {
            origin_x: 0.0,
            origin_y: 30.0,
            pixel_width: 10.0,
            pixel_height: 10.0,
        };
        let a = Array2::from_shape_fn((3, 3), |(row, col)| (row * 3 + col) as f64);
        let mut b = Array2::from_elem((3, 3), 100.0);
        b[[1, 1]] = f64::NAN;
        Raster::new(
            3,
            3,
            transform,
            Crs::epsg(32632),
            vec![
                Band {
                    name: "elevation".to_string(),
                    data: a,
                },
                Band {
                    name: "slope".to_string(),
                    data: b,
                },
            ],
        )
        .unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn surface_matches_source_geometry() {
        let raster = two_band_raster();
        let model = SumModel { n_inputs: 2 };
        let surface =
            predict_surface(&model, &raster, &names(&["elevation", "slope"]), false).unwrap();

        assert_eq!(surface.width(), raster.width());
        assert_eq!(surface.height(), raster.height());
        assert_eq!(surface.n_cells(), raster.n_cells());
        assert_eq!(surface.transform(), raster.transform());
        assert_eq!(surface.crs(), raster.crs());
        assert_eq!(surface.bands().len(), 1);
        // Cell (0, 0): 0 + 100.
        assert_eq!(surface.bands()[0].data[[0, 0]], 100.0);
    }

    #[test]
    fn nodata_propagates_as_nan() {
        let raster = two_band_raster();
        let model = SumModel { n_inputs: 2 };
        let surface =
            predict_surface(&model, &raster, &names(&["elevation", "slope"]), false).unwrap();
        assert!(surface.bands()[0].data[[1, 1]].is_nan());
        assert!(surface.bands()[0].data[[1, 0]].is_finite());
    }

    #[test]
    fn coordinates_feed_axis_inputs() {
        let raster = two_band_raster();
        let model = SumModel { n_inputs: 3 };
        let surface =
            predict_surface(&model, &raster, &names(&["elevation", "x", "y"]), true).unwrap();
        // Cell (0, 0): elevation 0 + center x 5 + center y 25.
        assert_eq!(surface.bands()[0].data[[0, 0]], 30.0);
    }

    #[test]
    fn unknown_feature_rejected() {
        let raster = two_band_raster();
        let model = SumModel { n_inputs: 1 };
        let err = predict_surface(&model, &raster, &names(&["aspect"]), false).unwrap_err();
        assert!(matches!(err, GeoError::MissingBand { .. }));
    }

    #[test]
    fn input_width_mismatch_rejected() {
        let raster = two_band_raster();
        let model = SumModel { n_inputs: 5 };
        let err =
            predict_surface(&model, &raster, &names(&["elevation", "slope"]), false).unwrap_err();
        assert!(matches!(err, GeoError::SurfaceInputMismatch { expected: 5, got: 2 }));
    }
}
