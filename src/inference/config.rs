//! Per-request inference options

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Probability at or above which a binary prediction picks the positive class
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.5;

/// Options forwarded verbatim to the predictor's inference calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InferenceKwargs(Map<String, Value>);

impl InferenceKwargs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value; `null` means no options
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            other => Ok(serde_json::from_value(other)?),
        }
    }

    /// Builder method to set an option
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}
