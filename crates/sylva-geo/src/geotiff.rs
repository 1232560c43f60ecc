//! GeoTIFF raster reading and writing.
//!
//! Each TIFF directory contributes its samples as bands, every pixel
//! format is widened to f64, and georeferencing comes from the
//! ModelPixelScale, ModelTiepoint, and GeoKeyDirectory tags. Only
//! north-up rasters are supported.

use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{TiffEncoder, colortype};
use tiff::tags::Tag;
use tracing::{debug, info, instrument};

use crate::crs::Crs;
use crate::error::GeoError;
use crate::raster::{Band, GeoTransform, Raster};

/// GeoKey ids carrying the EPSG code.
const PROJECTED_CS_TYPE: u32 = 3072;
const GEOGRAPHIC_TYPE: u32 = 2048;

/// Reads a multi-band GeoTIFF into a [`Raster`].
///
/// Bands are named `band_1..band_n` unless names are supplied via
/// [`GeoTiffReader::with_band_names`].
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`GeoError::FileNotFound`] | file does not exist or is unreadable |
/// | [`GeoError::TiffDecode`] | malformed TIFF structure |
/// | [`GeoError::UnsupportedPixelFormat`] | pixel type cannot widen to f64 |
/// | [`GeoError::MissingGeoTag`] | georeferencing tags absent |
/// | [`GeoError::BandNameCountMismatch`] | supplied names disagree with band count |
pub struct GeoTiffReader {
    path: PathBuf,
    band_names: Option<Vec<String>>,
}

impl GeoTiffReader {
    /// Create a reader for the given GeoTIFF path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            band_names: None,
        }
    }

    /// Name the bands instead of the default `band_{i}` scheme.
    #[must_use]
    pub fn with_band_names(mut self, names: Vec<String>) -> Self {
        self.band_names = Some(names);
        self
    }

    /// Read and georeference the raster.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Raster, GeoError> {
        let file = File::open(&self.path).map_err(|e| GeoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        let mut decoder = Decoder::new(file).map_err(|e| self.decode_err(e))?;

        let (width, height) = decoder.dimensions().map_err(|e| self.decode_err(e))?;
        let (width, height) = (width as usize, height as usize);

        // Georeferencing lives on the first directory.
        let pixel_scale = self.f64_tag(&mut decoder, Tag::ModelPixelScaleTag, "ModelPixelScale")?;
        let tiepoint = self.f64_tag(&mut decoder, Tag::ModelTiepointTag, "ModelTiepoint")?;
        let crs = self.read_crs(&mut decoder)?;

        if pixel_scale.len() < 2 || tiepoint.len() < 6 {
            return Err(GeoError::MissingGeoTag {
                path: self.path.clone(),
                tag: "ModelPixelScale/ModelTiepoint",
            });
        }
        let transform = GeoTransform {
            origin_x: tiepoint[3] - tiepoint[0] * pixel_scale[0],
            origin_y: tiepoint[4] + tiepoint[1] * pixel_scale[1],
            pixel_width: pixel_scale[0],
            pixel_height: pixel_scale[1],
        };

        // One or more directories, each holding interleaved samples.
        let mut raw_bands: Vec<Vec<f64>> = Vec::new();
        loop {
            let (w, h) = decoder.dimensions().map_err(|e| self.decode_err(e))?;
            if (w as usize, h as usize) != (width, height) {
                return Err(GeoError::TiffDecode {
                    path: self.path.clone(),
                    source: tiff::TiffError::LimitsExceeded,
                });
            }
            let image = decoder.read_image().map_err(|e| self.decode_err(e))?;
            let flat = widen_to_f64(image).ok_or_else(|| GeoError::UnsupportedPixelFormat {
                path: self.path.clone(),
            })?;

            let n_cells = width * height;
            let samples = flat.len() / n_cells;
            if samples == 0 || flat.len() != samples * n_cells {
                return Err(GeoError::UnsupportedPixelFormat {
                    path: self.path.clone(),
                });
            }
            for s in 0..samples {
                raw_bands.push(flat.iter().skip(s).step_by(samples).copied().collect());
            }

            if !decoder.more_images() {
                break;
            }
            decoder.next_image().map_err(|e| self.decode_err(e))?;
        }

        let names = match &self.band_names {
            Some(names) => {
                if names.len() != raw_bands.len() {
                    return Err(GeoError::BandNameCountMismatch {
                        path: self.path.clone(),
                        expected: names.len(),
                        got: raw_bands.len(),
                    });
                }
                names.clone()
            }
            None => (1..=raw_bands.len()).map(|i| format!("band_{i}")).collect(),
        };

        let bands = names
            .into_iter()
            .zip(raw_bands)
            .map(|(name, data)| {
                debug!(band = %name, "band decoded");
                Band {
                    name,
                    data: Array2::from_shape_vec((height, width), data)
                        .expect("band length checked against dimensions"),
                }
            })
            .collect();

        let raster = Raster::new(width, height, transform, crs, bands)?;
        info!(
            width,
            height,
            n_bands = raster.bands().len(),
            crs = %raster.crs(),
            "raster loaded"
        );
        Ok(raster)
    }

    fn decode_err(&self, source: tiff::TiffError) -> GeoError {
        GeoError::TiffDecode {
            path: self.path.clone(),
            source,
        }
    }

    fn f64_tag(
        &self,
        decoder: &mut Decoder<File>,
        tag: Tag,
        name: &'static str,
    ) -> Result<Vec<f64>, GeoError> {
        decoder
            .find_tag(tag)
            .map_err(|e| self.decode_err(e))?
            .ok_or(GeoError::MissingGeoTag {
                path: self.path.clone(),
                tag: name,
            })?
            .into_f64_vec()
            .map_err(|e| self.decode_err(e))
    }

    fn read_crs(&self, decoder: &mut Decoder<File>) -> Result<Crs, GeoError> {
        let keys = decoder
            .find_tag(Tag::GeoKeyDirectoryTag)
            .map_err(|e| self.decode_err(e))?
            .ok_or(GeoError::MissingGeoTag {
                path: self.path.clone(),
                tag: "GeoKeyDirectory",
            })?
            .into_u32_vec()
            .map_err(|e| self.decode_err(e))?;

        // Entries of four shorts follow the four-short header:
        // key id, tag location, count, value.
        let mut epsg = None;
        for entry in keys[4.min(keys.len())..].chunks_exact(4) {
            if entry[1] == 0 && (entry[0] == PROJECTED_CS_TYPE || entry[0] == GEOGRAPHIC_TYPE) {
                epsg = Some(entry[3]);
                if entry[0] == PROJECTED_CS_TYPE {
                    break;
                }
            }
        }
        epsg.map(Crs::epsg).ok_or(GeoError::MissingGeoTag {
            path: self.path.clone(),
            tag: "GeoKeyDirectory CRS key",
        })
    }
}

/// Write a raster's first band as a single-band Gray32Float GeoTIFF.
///
/// Georeferencing tags are rebuilt from the raster's transform and CRS,
/// so the output opens with the same extent, resolution, and CRS as its
/// source grid.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`GeoError::UnsupportedCrsCode`] | the EPSG code does not fit a geokey (> 65535) |
/// | [`GeoError::WriteFile`] | output file cannot be created |
/// | [`GeoError::TiffEncode`] | TIFF encoding failed |
#[instrument(skip(raster), fields(path = %path.display(), width = raster.width(), height = raster.height()))]
pub fn write_surface(path: &Path, raster: &Raster) -> Result<(), GeoError> {
    // Geokey values are u16, so the EPSG code must fit before anything
    // is written.
    let epsg_key = u16::try_from(raster.crs().code()).map_err(|_| GeoError::UnsupportedCrsCode {
        code: raster.crs().code(),
    })?;

    let encode_err = |source| GeoError::TiffEncode {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(|e| GeoError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut encoder = TiffEncoder::new(file).map_err(encode_err)?;
    let mut image = encoder
        .new_image::<colortype::Gray32Float>(raster.width() as u32, raster.height() as u32)
        .map_err(encode_err)?;

    let t = raster.transform();
    let pixel_scale = [t.pixel_width, t.pixel_height, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0];
    // Minimal directory: version header plus model type and CRS keys.
    let geo_keys: [u16; 12] = [
        1,
        1,
        0,
        2,
        1024,
        0,
        1,
        1,
        PROJECTED_CS_TYPE as u16,
        0,
        1,
        epsg_key,
    ];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &pixel_scale[..])
        .map_err(encode_err)?;
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(encode_err)?;
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &geo_keys[..])
        .map_err(encode_err)?;

    let band = &raster.bands()[0];
    let data: Vec<f32> = band.data.iter().map(|&v| v as f32).collect();
    image.write_data(&data).map_err(encode_err)?;

    info!(band = %band.name, "surface written");
    Ok(())
}

fn widen_to_f64(image: DecodingResult) -> Option<Vec<f64>> {
    let flat = match image {
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U64(buf) => buf.into_iter().map(|v| v as f64).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I64(buf) => buf.into_iter().map(|v| v as f64).collect(),
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(flat)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn test_raster() -> Raster {
        let transform = GeoTransform {
            origin_x: 500_000.0,
            origin_y: 5_200_000.0,
            pixel_width: 25.0,
            pixel_height: 25.0,
        };
        let data = Array2::from_shape_fn((8, 10), |(row, col)| (row * 10 + col) as f64);
        Raster::new(
            10,
            8,
            transform,
            Crs::epsg(32632),
            vec![Band {
                name: "prediction".to_string(),
                data,
            }],
        )
        .unwrap()
    }

    #[test]
    fn round_trip_preserves_geometry_and_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("surface.tif");

        let original = test_raster();
        write_surface(&path, &original).unwrap();
        let restored = GeoTiffReader::new(&path).read().unwrap();

        assert_eq!(restored.width(), original.width());
        assert_eq!(restored.height(), original.height());
        assert_eq!(restored.n_cells(), original.n_cells());
        assert_eq!(restored.transform(), original.transform());
        assert_eq!(restored.crs(), original.crs());
        for (a, b) in restored.bands()[0]
            .data
            .iter()
            .zip(original.bands()[0].data.iter())
        {
            assert!((a - b).abs() < 1e-6, "cell values differ: {a} vs {b}");
        }
    }

    #[test]
    fn nan_cells_survive_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nodata.tif");

        let mut raster = test_raster();
        let mut bands = raster.bands().to_vec();
        bands[0].data[[0, 0]] = f64::NAN;
        raster = Raster::new(10, 8, raster.transform(), raster.crs(), bands).unwrap();

        write_surface(&path, &raster).unwrap();
        let restored = GeoTiffReader::new(&path).read().unwrap();
        assert!(restored.bands()[0].data[[0, 0]].is_nan());
        assert!(restored.bands()[0].data[[0, 1]].is_finite());
    }

    #[test]
    fn custom_band_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("named.tif");
        write_surface(&path, &test_raster()).unwrap();

        let raster = GeoTiffReader::new(&path)
            .with_band_names(vec!["elevation".to_string()])
            .read()
            .unwrap();
        assert!(raster.band("elevation").is_some());

        let err = GeoTiffReader::new(&path)
            .with_band_names(vec!["a".to_string(), "b".to_string()])
            .read()
            .unwrap_err();
        assert!(matches!(err, GeoError::BandNameCountMismatch { .. }));
    }

    #[test]
    fn oversized_epsg_code_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad_crs.tif");

        let raster = test_raster();
        let big_crs = Raster::new(
            10,
            8,
            raster.transform(),
            Crs::epsg(100_000),
            raster.bands().to_vec(),
        )
        .unwrap();

        let err = write_surface(&path, &big_crs).unwrap_err();
        assert!(matches!(err, GeoError::UnsupportedCrsCode { code: 100_000 }));
        assert!(!path.exists());
    }

    #[test]
    fn plain_tiff_without_geotags_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.tif");

        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        encoder
            .write_image::<colortype::Gray32Float>(4, 3, &data)
            .unwrap();

        let err = GeoTiffReader::new(&path).read().unwrap_err();
        assert!(matches!(err, GeoError::MissingGeoTag { .. }));
    }

    #[test]
    fn nonexistent_file_error() {
        let err = GeoTiffReader::new(Path::new("/nonexistent/raster.tif"))
            .read()
            .unwrap_err();
        assert!(matches!(err, GeoError::FileNotFound { .. }));
    }
}
