//! GeoJSON polygon reading for the prediction domain.

use std::path::{Path, PathBuf};

use serde_json::Value;
use sylva_cv::Polygon;
use tracing::{info, instrument};

use crate::crs::Crs;
use crate::error::GeoError;

/// Read the prediction-domain polygon from a GeoJSON file.
///
/// Accepts a bare `Polygon` geometry, a `Feature` wrapping one, or a
/// `FeatureCollection` whose first feature is a polygon. Only the
/// exterior ring is used; holes are ignored. GeoJSON files carry no CRS
/// since RFC 7946, but when the legacy `crs` member is present and
/// `expected_crs` is given, the two are compared.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`GeoError::FileNotFound`] | file doesn't exist or is unreadable |
/// | [`GeoError::GeoJsonParse`] | invalid JSON or no polygon geometry |
/// | [`GeoError::CrsMismatch`] | a legacy `crs` member names a different EPSG |
/// | [`GeoError::Domain`] | the ring is geometrically degenerate |
#[instrument(skip(expected_crs), fields(path = %path.display()))]
pub fn read_domain_polygon(path: &Path, expected_crs: Option<Crs>) -> Result<Polygon, GeoError> {
    let text = std::fs::read_to_string(path).map_err(|e| GeoError::FileNotFound {
        path: path.to_path_buf(),
        source: e,
    })?;
    let root: Value = serde_json::from_str(&text).map_err(|e| GeoError::GeoJsonParse {
        path: path.to_path_buf(),
        reason: format!("invalid JSON: {e}"),
    })?;

    if let (Some(expected), Some(declared)) = (expected_crs, legacy_crs(&root))
        && declared != expected
    {
        return Err(GeoError::CrsMismatch {
            left: declared,
            right: expected,
        });
    }

    let geometry = unwrap_geometry(&root).ok_or_else(|| GeoError::GeoJsonParse {
        path: path.to_path_buf(),
        reason: "no geometry object found".to_string(),
    })?;

    let parse_err = |reason: &str| GeoError::GeoJsonParse {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if geometry["type"].as_str() != Some("Polygon") {
        return Err(parse_err("geometry is not a Polygon"));
    }
    let exterior = geometry["coordinates"]
        .as_array()
        .and_then(|rings| rings.first())
        .and_then(Value::as_array)
        .ok_or_else(|| parse_err("Polygon has no exterior ring"))?;

    let mut vertices = Vec::with_capacity(exterior.len());
    for position in exterior {
        let pair = position.as_array().ok_or_else(|| parse_err("position is not an array"))?;
        let x = pair.first().and_then(Value::as_f64);
        let y = pair.get(1).and_then(Value::as_f64);
        match (x, y) {
            (Some(x), Some(y)) => vertices.push((x, y)),
            _ => return Err(parse_err("position is not a numeric [x, y] pair")),
        }
    }

    let polygon = Polygon::new(vertices)?;
    info!(n_vertices = polygon.vertices().len(), "domain polygon loaded");
    Ok(polygon)
}

/// Extract the EPSG code from a pre-RFC-7946 `crs` member, if any.
/// Accepts both `EPSG:nnnn` and `urn:ogc:def:crs:EPSG::nnnn` names.
fn legacy_crs(root: &Value) -> Option<Crs> {
    let name = root.get("crs")?.get("properties")?.get("name")?.as_str()?;
    let code = name.rsplit(':').next()?.parse::<u32>().ok()?;
    Some(Crs::epsg(code))
}

/// Walk Feature/FeatureCollection wrappers down to a geometry object.
fn unwrap_geometry(root: &Value) -> Option<&Value> {
    match root["type"].as_str()? {
        "FeatureCollection" => root["features"]
            .as_array()?
            .first()
            .and_then(|f| f.get("geometry")),
        "Feature" => root.get("geometry"),
        _ => Some(root),
    }
}
