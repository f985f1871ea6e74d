//! multimodal-serve - serving shim for multimodal predictors
//!
//! This crate adapts a trained tabular/text/image predictor to a
//! content-typed request/response protocol:
//! - Decoding of parquet, CSV, JSON, JSON-lines, `.npy` image tokens,
//!   pickled envelopes and raw images
//! - Schema reconciliation for headerless tables and image columns
//! - Inference with class probabilities for classification problems
//! - Response encoding as parquet, JSON or CSV
//!
//! # Modules
//!
//! - [`handler`] - Load and transform entry points
//! - [`codec`] - Request decoders and response encoders
//! - [`content_type`] - Supported input and output content types
//! - [`schema`] - Feature-column reconciliation
//! - [`predictor`] - Predictor trait and the JSON-artifact predictor
//! - [`inference`] - Inference invocation and result assembly
//! - [`server`] - HTTP host (`/ping`, `/invocations`)
//! - [`cli`] - Command-line interface

pub mod error;

pub mod codec;
pub mod content_type;
pub mod handler;
pub mod inference;
pub mod predictor;
pub mod schema;

pub mod cli;
pub mod server;

pub use error::{Result, ServeError};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::content_type::{InputContentType, OutputContentType};
    pub use crate::error::{Result, ServeError};
    pub use crate::handler::ModelHandler;
    pub use crate::inference::InferenceKwargs;
    pub use crate::predictor::{
        ArtifactPredictor, ColumnType, ColumnTypes, LoadPredictor, ModelInput, Prediction,
        Predictor, ProblemType,
    };
    pub use crate::schema::ColumnSchema;
}
