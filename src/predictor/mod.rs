//! Predictor abstraction
//!
//! A predictor is the trained model the shim serves. It reports its problem
//! type, label and declared column types, and answers `predict` and
//! `predict_proba` over either a table or a list of raw images.

mod artifact;

pub use artifact::{ArtifactPredictor, ARTIFACT_FILE};

use polars::prelude::*;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;

use crate::error::Result;
use crate::inference::InferenceKwargs;

/// Task category declared by a predictor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    Binary,
    Multiclass,
    Regression,
    Quantile,
    /// Any task without a probability output
    #[serde(other)]
    Other,
}

impl ProblemType {
    pub fn is_classification(&self) -> bool {
        matches!(self, ProblemType::Binary | ProblemType::Multiclass)
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProblemType::Binary => "binary",
            ProblemType::Multiclass => "multiclass",
            ProblemType::Regression => "regression",
            ProblemType::Quantile => "quantile",
            ProblemType::Other => "other",
        };
        f.write_str(name)
    }
}

/// Declared semantic type of an input column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Categorical,
    Numerical,
    Text,
    ImagePath,
    Image,
    ImageBytearray,
    #[serde(other)]
    Other,
}

impl ColumnType {
    /// Column types whose cells carry base85-encoded image bytes
    pub fn is_image(&self) -> bool {
        matches!(
            self,
            ColumnType::ImagePath | ColumnType::Image | ColumnType::ImageBytearray
        )
    }
}

/// Ordered mapping from column name to declared type, label included
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnTypes(Vec<(String, ColumnType)>);

impl ColumnTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to append a column
    pub fn with(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.insert(name, column_type);
        self
    }

    /// Insert or replace a column, keeping its first position
    pub fn insert(&mut self, name: impl Into<String>, column_type: ColumnType) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = column_type,
            None => self.0.push((name, column_type)),
        }
    }

    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, t)| *t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.0.iter().map(|(n, t)| (n.as_str(), *t))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First column, in declaration order, holding image data
    pub fn image_column(&self) -> Option<&str> {
        self.iter().find(|(_, t)| t.is_image()).map(|(n, _)| n)
    }
}

impl Serialize for ColumnTypes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, column_type) in &self.0 {
            map.serialize_entry(name, column_type)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ColumnTypes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = ColumnTypes;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column name to column type")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut types = ColumnTypes::new();
                while let Some((name, column_type)) = access.next_entry::<String, ColumnType>()? {
                    types.insert(name, column_type);
                }
                Ok(types)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Decoded request handed to the predictor
#[derive(Debug, Clone)]
pub enum ModelInput {
    /// Rows of named feature columns
    Table(DataFrame),
    /// Raw image buffers, fed as the `image` input
    Images(Vec<Vec<u8>>),
}

impl ModelInput {
    pub fn num_rows(&self) -> usize {
        match self {
            ModelInput::Table(df) => df.height(),
            ModelInput::Images(images) => images.len(),
        }
    }
}

/// Output of the single-output inference path
#[derive(Debug, Clone)]
pub enum Prediction {
    Series(Series),
    Frame(DataFrame),
}

impl Prediction {
    /// Wrap a bare series as a one-column frame
    pub fn into_frame(self) -> Result<DataFrame> {
        match self {
            Prediction::Frame(df) => Ok(df),
            Prediction::Series(series) => Ok(DataFrame::new(vec![series.into()])?),
        }
    }
}

/// A loaded, trained model
pub trait Predictor: Send + Sync {
    fn problem_type(&self) -> ProblemType;

    /// Name of the label column
    fn label(&self) -> &str;

    /// Declared types of every column seen in training, label included
    fn column_types(&self) -> &ColumnTypes;

    fn predict(&self, input: &ModelInput, kwargs: &InferenceKwargs) -> Result<Prediction>;

    /// Per-class probabilities, one column per class label
    fn predict_proba(&self, input: &ModelInput, kwargs: &InferenceKwargs) -> Result<DataFrame>;
}

/// Predictors that can be restored from a model directory
pub trait LoadPredictor: Predictor + Sized + 'static {
    fn load(model_dir: &Path) -> Result<Self>;
}
