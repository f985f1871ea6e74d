//! Inference module
//!
//! Forwards decoded requests to the predictor and assembles the result
//! table:
//! - Probability path for binary and multiclass tasks
//! - Class prediction derived from probabilities
//! - `_proba` column naming
//! - Single-output path for every other task

mod config;
mod engine;

pub use config::{InferenceKwargs, DEFAULT_DECISION_THRESHOLD};
pub use engine::{derive_prediction, run_inference, PROBA_SUFFIX};
