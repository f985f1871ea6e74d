//! Error types for the serving shim

use thiserror::Error;

use crate::codec::base85::Base85Error;
use crate::codec::npy::NpyError;

/// Result type alias for serving operations
pub type Result<T> = std::result::Result<T, ServeError>;

/// Main error type for load and transform calls.
///
/// Library failures are wrapped transparently so their messages reach the
/// caller unchanged.
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("{0} content type not supported")]
    UnsupportedContentType(String),

    #[error("Invalid data format. Input data has {actual} columns while the model expects {expected}")]
    SchemaMismatch { actual: usize, expected: usize },

    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Pickle(#[from] serde_pickle::Error),

    #[error(transparent)]
    Base85(#[from] Base85Error),

    #[error(transparent)]
    Npy(#[from] NpyError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ServeError {
    /// True for failures caused by the request payload rather than the model
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServeError::SchemaMismatch { .. }
                | ServeError::Polars(_)
                | ServeError::Json(_)
                | ServeError::Pickle(_)
                | ServeError::Base85(_)
                | ServeError::Npy(_)
        )
    }

    /// Reclassify a table failure raised once the request has decoded.
    ///
    /// Polars and JSON errors count as client errors only while the body is
    /// being read; past that point they are model-side failures.
    pub fn during_inference(self) -> Self {
        match self {
            ServeError::Polars(e) => ServeError::Inference(e.to_string()),
            ServeError::Json(e) => ServeError::Inference(e.to_string()),
            other => other,
        }
    }
}
