//! Prediction-domain polygon geometry.

use crate::error::CvError;

/// A simple polygon describing the prediction domain.
///
/// Vertices are stored in ring order without a closing duplicate. The
/// polygon must be non-degenerate: at least three distinct vertices and
/// a nonzero area.
#[derive(Debug, Clone)]
pub struct Polygon {
    vertices: Vec<(f64, f64)>,
}

impl Polygon {
    /// Build a polygon from a vertex ring.
    ///
    /// A closing vertex equal to the first is dropped if present.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CvError::DegenerateDomain`] | fewer than 3 distinct vertices, a non-finite vertex, or zero area |
    pub fn new(mut vertices: Vec<(f64, f64)>) -> Result<Self, CvError> {
        if vertices.len() >= 2 && vertices.first() == vertices.last() {
            vertices.pop();
        }

        if vertices.len() < 3 {
            return Err(CvError::DegenerateDomain {
                reason: format!("polygon has {} vertices, need at least 3", vertices.len()),
            });
        }
        for &(x, y) in &vertices {
            if !x.is_finite() || !y.is_finite() {
                return Err(CvError::DegenerateDomain {
                    reason: "polygon has a non-finite vertex".to_string(),
                });
            }
        }

        let polygon = Self { vertices };
        if polygon.area() == 0.0 {
            return Err(CvError::DegenerateDomain {
                reason: "polygon has zero area".to_string(),
            });
        }
        Ok(polygon)
    }

    /// Absolute area by the shoelace formula.
    #[must_use]
    pub fn area(&self) -> f64 {
        let n = self.vertices.len();
        let mut twice_area = 0.0;
        for i in 0..n {
            let (xi, yi) = self.vertices[i];
            let (xj, yj) = self.vertices[(i + 1) % n];
            twice_area += xi * yj - xj * yi;
        }
        (twice_area / 2.0).abs()
    }

    /// Axis-aligned bounding box as `(min_x, min_y, max_x, max_y)`.
    #[must_use]
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for &(x, y) in &self.vertices {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        (min_x, min_y, max_x, max_y)
    }

    /// Point-in-polygon test by ray casting.
    ///
    /// Points exactly on an edge may land on either side.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let n = self.vertices.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.vertices[i];
            let (xj, yj) = self.vertices[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// The vertex ring, without a closing duplicate.
    #[must_use]
    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Polygon {
        Polygon::new(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]).unwrap()
    }

    #[test]
    fn closing_vertex_dropped() {
        let p = Polygon::new(vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (0.0, 0.0),
        ])
        .unwrap();
        assert_eq!(p.vertices().len(), 4);
    }

    #[test]
    fn too_few_vertices_rejected() {
        let err = Polygon::new(vec![(0.0, 0.0), (1.0, 1.0)]).unwrap_err();
        assert!(matches!(err, CvError::DegenerateDomain { .. }));
    }

    #[test]
    fn collinear_vertices_rejected() {
        let err = Polygon::new(vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]).unwrap_err();
        assert!(matches!(err, CvError::DegenerateDomain { .. }));
    }

    #[test]
    fn non_finite_vertex_rejected() {
        let err = Polygon::new(vec![(0.0, 0.0), (f64::NAN, 0.0), (1.0, 1.0)]).unwrap_err();
        assert!(matches!(err, CvError::DegenerateDomain { .. }));
    }

    #[test]
    fn unit_square_area() {
        assert!((unit_square().area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn contains_interior_and_exterior() {
        let square = unit_square();
        assert!(square.contains(0.5, 0.5));
        assert!(!square.contains(1.5, 0.5));
        assert!(!square.contains(-0.1, 0.5));
    }

    #[test]
    fn bounding_box_of_square() {
        let (min_x, min_y, max_x, max_y) = unit_square().bounding_box();
        assert_eq!((min_x, min_y, max_x, max_y), (0.0, 0.0, 1.0, 1.0));
    }
}
