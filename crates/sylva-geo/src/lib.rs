//! Geospatial data handling for the sylva pipeline.
//!
//! Covers GeoTIFF raster and CSV point input, GeoJSON domain polygons,
//! the raster-to-point spatial join, regression task assembly,
//! wall-to-wall prediction surfaces, and JSON/CSV result artifacts.

mod crs;
mod error;
mod geojson;
mod geotiff;
mod join;
mod points;
mod raster;
mod surface;
mod task;
mod writer;

pub use crs::Crs;
pub use error::GeoError;
pub use geojson::read_domain_polygon;
pub use geotiff::{GeoTiffReader, write_surface};
pub use join::{JoinedDataset, join};
pub use points::{PointReader, PointSet};
pub use raster::{Band, GeoTransform, Raster};
pub use surface::predict_surface;
pub use task::{Task, TaskError};
pub use writer::{ResultWriter, RunName};
