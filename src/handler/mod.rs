//! Model handler: the load and transform entry points
//!
//! [`ModelHandler::load`] restores a predictor and caches its feature
//! schema; [`ModelHandler::transform`] runs one request end to end:
//! decode, reconcile, infer, encode, clean up.

mod cleanup;

pub use cleanup::{cleanup_images, IMAGE_SUFFIX};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::codec::{self, DecodedRequest};
use crate::content_type::{InputContentType, OutputContentType};
use crate::error::{Result, ServeError};
use crate::inference::run_inference;
use crate::predictor::{LoadPredictor, ModelInput, Predictor};
use crate::schema::{decode_image_column, ColumnSchema};

/// A loaded predictor plus the state every request reads
#[derive(Clone)]
pub struct ModelHandler {
    predictor: Arc<dyn Predictor>,
    schema: ColumnSchema,
    scratch_dir: PathBuf,
}

impl std::fmt::Debug for ModelHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandler")
            .field("problem_type", &self.predictor.problem_type())
            .field("label", &self.predictor.label())
            .field("schema", &self.schema)
            .field("scratch_dir", &self.scratch_dir)
            .finish()
    }
}

impl ModelHandler {
    /// Load a predictor from a model directory and cache its schema
    pub fn load<P: LoadPredictor>(model_dir: impl AsRef<Path>) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        let start = Instant::now();
        let predictor = P::load(model_dir)?;
        let handler = Self::from_predictor(Arc::new(predictor));
        info!(
            model_dir = %model_dir.display(),
            problem_type = %handler.predictor.problem_type(),
            label = %handler.predictor.label(),
            features = handler.schema.len(),
            load_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Model loaded"
        );
        Ok(handler)
    }

    /// Wrap an already-loaded predictor
    pub fn from_predictor(predictor: Arc<dyn Predictor>) -> Self {
        let schema = ColumnSchema::from_column_types(predictor.column_types(), predictor.label());
        Self {
            predictor,
            schema,
            scratch_dir: PathBuf::from("."),
        }
    }

    /// Builder method to set the directory swept for image artifacts
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn predictor(&self) -> &dyn Predictor {
        self.predictor.as_ref()
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Decode a body and align tables with the cached schema
    pub fn decode(&self, content_type: InputContentType, body: &[u8]) -> Result<DecodedRequest> {
        let mut decoded = codec::decode_request(content_type, body)?;
        if let ModelInput::Table(df) = decoded.input {
            let df = self.schema.reconcile(df)?;
            let df = decode_image_column(df, self.predictor.column_types())?;
            decoded.input = ModelInput::Table(df);
        }
        Ok(decoded)
    }

    /// Serve one request given raw content-type strings.
    ///
    /// Both content types are resolved before the body is read, so an
    /// unsupported type never reaches the decoder or the predictor.
    pub fn transform(
        &self,
        body: &[u8],
        input_content_type: &str,
        output_content_type: &str,
    ) -> Result<(Vec<u8>, OutputContentType)> {
        let input_type: InputContentType = input_content_type.parse()?;
        let output_type = OutputContentType::negotiate(output_content_type)?;
        let output = self.transform_typed(body, input_type, output_type)?;
        Ok((output, output_type))
    }

    /// Serve one request with resolved content types
    pub fn transform_typed(
        &self,
        body: &[u8],
        input_type: InputContentType,
        output_type: OutputContentType,
    ) -> Result<Vec<u8>> {
        let start = Instant::now();
        let decoded = self.decode(input_type, body)?;
        let rows = decoded.input.num_rows();

        let mut prediction = run_inference(self.predictor.as_ref(), &decoded.input, &decoded.kwargs)?;
        let output = codec::encode_response(output_type, &mut prediction)
            .map_err(ServeError::during_inference)?;

        if let Err(e) = cleanup_images(&self.scratch_dir) {
            warn!(dir = %self.scratch_dir.display(), error = %e, "Image cleanup failed");
        }

        debug!(
            input_type = %input_type,
            output_type = %output_type,
            rows,
            body_bytes = body.len(),
            output_bytes = output.len(),
            latency_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Request transformed"
        );
        Ok(output)
    }
}
