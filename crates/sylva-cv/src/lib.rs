//! Spatially-aware resampling strategies for the sylva pipeline.
//!
//! Provides three interchangeable fold-assignment strategies — random
//! holdout, spatial block cross-validation, and k-nearest-neighbour
//! distance-matched cross-validation — all producing a validated
//! [`ResamplingPlan`], plus the prediction-domain [`Polygon`] geometry.

mod block;
mod domain;
mod error;
mod holdout;
mod knndm;
mod plan;

pub use block::SpatialBlockCv;
pub use domain::Polygon;
pub use error::CvError;
pub use holdout::HoldoutSplit;
pub use knndm::KnnDistanceMatch;
pub use plan::{Fold, ResamplingPlan, Strategy};
