//! Coordinate reference system identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A coordinate reference system identified by its EPSG code.
///
/// Sylva never reprojects: every input must already share one CRS, and
/// a mismatch is a hard error at join time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs(u32);

impl Crs {
    /// Create a CRS from an EPSG code.
    #[must_use]
    pub fn epsg(code: u32) -> Self {
        Self(code)
    }

    /// The EPSG code.
    #[must_use]
    pub fn code(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}
