//! Pickled request envelopes
//!
//! The `application/x-autogluon-*` content types wrap the real payload in a
//! pickled dictionary `{"data": bytes, "inference_kwargs": dict | None}`.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::inference::InferenceKwargs;

#[derive(Debug, Deserialize)]
struct WireEnvelope {
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
    #[serde(default)]
    inference_kwargs: Option<InferenceKwargs>,
}

#[derive(Serialize)]
struct WireEnvelopeRef<'a> {
    #[serde(with = "serde_bytes")]
    data: &'a [u8],
    inference_kwargs: Option<&'a InferenceKwargs>,
}

/// Unpacked envelope contents
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub data: Vec<u8>,
    pub inference_kwargs: InferenceKwargs,
}

/// Unpickle an envelope; a `None` kwargs entry becomes the empty set
pub fn decode(body: &[u8]) -> Result<Envelope> {
    let wire: WireEnvelope = serde_pickle::from_slice(body, serde_pickle::DeOptions::new())?;
    Ok(Envelope {
        data: wire.data,
        inference_kwargs: wire.inference_kwargs.unwrap_or_default(),
    })
}

/// Pickle an envelope the way the Python client does
pub fn encode(data: &[u8], inference_kwargs: Option<&InferenceKwargs>) -> Result<Vec<u8>> {
    let wire = WireEnvelopeRef { data, inference_kwargs };
    Ok(serde_pickle::to_vec(&wire, serde_pickle::SerOptions::new())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_none_kwargs_become_empty() {
        let body = encode(b"PAR1", None).unwrap();
        let envelope = decode(&body).unwrap();
        assert_eq!(envelope.data, b"PAR1");
        assert!(envelope.inference_kwargs.is_empty());
    }

    #[test]
    fn test_kwargs_pass_through() {
        let kwargs = InferenceKwargs::from_value(json!({"realtime": true, "batch_size": 4})).unwrap();
        let body = encode(b"\x93NUMPY", Some(&kwargs)).unwrap();
        let envelope = decode(&body).unwrap();
        assert_eq!(envelope.inference_kwargs, kwargs);
        assert_eq!(envelope.inference_kwargs.get("batch_size"), Some(&json!(4)));
    }

    #[test]
    fn test_decode_python_pickles() {
        // pickle.dumps({"data": b"ab", "inference_kwargs": None}, protocol=3)
        let body = b"\x80\x03}q\x00(X\x04\x00\x00\x00dataq\x01C\x02abq\x02X\x10\x00\x00\x00inference_kwargsq\x03Nu.";
        let envelope = decode(body).unwrap();
        assert_eq!(envelope.data, b"ab");
        assert!(envelope.inference_kwargs.is_empty());

        // pickle.dumps({"data": b"ab", "inference_kwargs": {"realtime": True}}, protocol=4)
        let body = b"\x80\x04\x953\x00\x00\x00\x00\x00\x00\x00}\x94(\x8c\x04data\x94C\x02ab\x94\x8c\x10inference_kwargs\x94}\x94\x8c\x08realtime\x94\x88su.";
        let envelope = decode(body).unwrap();
        assert_eq!(envelope.data, b"ab");
        assert_eq!(envelope.inference_kwargs.get("realtime"), Some(&json!(true)));
    }

    #[test]
    fn test_garbage_is_a_pickle_error() {
        let err = decode(b"not a pickle").unwrap_err();
        assert!(matches!(err, crate::error::ServeError::Pickle(_)));
    }
}
