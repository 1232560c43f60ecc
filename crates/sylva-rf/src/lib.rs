//! Random Forest regression: train, evaluate, predict.
//!
//! Provides a hand-rolled Random Forest regressor with CART regression
//! trees, variance-reduction splits, parallel training via rayon,
//! out-of-bag evaluation, feature importance, regression metrics, and
//! model serialization.

mod config;
mod error;
mod forest;
mod importance;
mod metrics;
mod node;
mod oob;
mod predict;
mod result;
mod serialize;
mod split;
mod tree;

pub use config::{Mtry, OobMode, RegressionForestConfig};
pub use error::RfError;
pub use forest::RegressionForest;
pub use importance::RankedFeature;
pub use metrics::{Metric, mae, r_squared, rmse};
pub use node::{FeatureIndex, Node, NodeIndex, Variance};
pub use oob::OobScore;
pub use predict::Predictor;
pub use result::{RegressionForestResult, TrainingMetadata};
pub use tree::{RegressionTree, RegressionTreeConfig};
