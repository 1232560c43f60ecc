//! Grid-search hyperparameter tuning for Random Forest regression.
//!
//! A [`ParamGrid`] enumerates candidate hyperparameter combinations, a
//! [`GridSearch`] fits one model per combination per resampling fold,
//! and every fitted trial is recorded in an archive of
//! [`TrialRecord`]s alongside the winning combination.

mod archive;
mod error;
mod grid;
mod tuner;

pub use archive::{ComboScore, TrialRecord, mean_scores};
pub use error::TuneError;
pub use grid::{ParamGrid, ParamSet};
pub use tuner::{GridSearch, TuneResult};
