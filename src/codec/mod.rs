//! Request decoding and response encoding
//!
//! One decoder per [`InputContentType`] and one encoder per
//! [`OutputContentType`]; the match arms are exhaustive so adding a content
//! type forces a codec for it.

pub mod base85;
pub mod envelope;
pub mod npy;
pub mod tabular;

use polars::prelude::DataFrame;

use crate::content_type::{InputContentType, OutputContentType};
use crate::error::Result;
use crate::inference::InferenceKwargs;
use crate::predictor::ModelInput;

/// A request body decoded into predictor input plus its inference options
#[derive(Debug, Clone)]
pub struct DecodedRequest {
    pub input: ModelInput,
    pub kwargs: InferenceKwargs,
}

impl DecodedRequest {
    fn table(df: DataFrame) -> Self {
        Self {
            input: ModelInput::Table(df),
            kwargs: InferenceKwargs::default(),
        }
    }

    fn images(images: Vec<Vec<u8>>) -> Self {
        Self {
            input: ModelInput::Images(images),
            kwargs: InferenceKwargs::default(),
        }
    }

    fn with_kwargs(mut self, kwargs: InferenceKwargs) -> Self {
        self.kwargs = kwargs;
        self
    }
}

/// Decode a request body according to its content type
pub fn decode_request(content_type: InputContentType, body: &[u8]) -> Result<DecodedRequest> {
    let decoded = match content_type {
        InputContentType::Parquet => DecodedRequest::table(tabular::read_parquet(body)?),
        InputContentType::Csv => DecodedRequest::table(tabular::read_csv(body)?),
        InputContentType::Json => DecodedRequest::table(tabular::read_json(body)?),
        InputContentType::JsonLines => DecodedRequest::table(tabular::read_json_lines(body)?),
        InputContentType::Npy => DecodedRequest::images(decode_image_tokens(body)?),
        InputContentType::AutogluonParquet => {
            let envelope = envelope::decode(body)?;
            DecodedRequest::table(tabular::read_parquet(&envelope.data)?)
                .with_kwargs(envelope.inference_kwargs)
        }
        InputContentType::AutogluonNpy => {
            let envelope = envelope::decode(body)?;
            DecodedRequest::images(decode_image_tokens(&envelope.data)?)
                .with_kwargs(envelope.inference_kwargs)
        }
        InputContentType::Image => DecodedRequest::images(vec![body.to_vec()]),
    };
    Ok(decoded)
}

/// Encode a result table in the negotiated response format
pub fn encode_response(content_type: OutputContentType, df: &mut DataFrame) -> Result<Vec<u8>> {
    match content_type {
        OutputContentType::Parquet => tabular::write_parquet(df),
        OutputContentType::Json => tabular::write_json(df),
        OutputContentType::Csv => tabular::write_csv(df),
    }
}

/// Base85-decode every element of a `.npy` token array
fn decode_image_tokens(body: &[u8]) -> Result<Vec<Vec<u8>>> {
    npy::decode_tokens(body)?
        .iter()
        .map(|token| Ok(base85::decode(token)?))
        .collect()
}
