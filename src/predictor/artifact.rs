//! Linear predictor restored from a JSON model artifact
//!
//! The artifact lives at `<model_dir>/predictor.json`:
//!
//! ```json
//! {
//!   "problem_type": "multiclass",
//!   "label": "species",
//!   "column_types": {"petal_length": "numerical", "photo": "image", "species": "categorical"},
//!   "classes": ["setosa", "versicolor", "virginica"],
//!   "intercept": [0.1, 0.0, -0.1],
//!   "coefficients": {"petal_length": [-1.0, 0.2, 0.8], "photo": [0.0, 0.5, -0.5]}
//! }
//! ```
//!
//! Binary tasks carry a single output (the positive-class logit), multiclass
//! tasks one output per class, every other task one raw score.

use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, ServeError};
use crate::inference::InferenceKwargs;
use super::{ColumnTypes, LoadPredictor, ModelInput, Prediction, Predictor, ProblemType};

/// Artifact file name inside a model directory
pub const ARTIFACT_FILE: &str = "predictor.json";

#[derive(Debug, Deserialize)]
struct ArtifactDocument {
    problem_type: ProblemType,
    label: String,
    column_types: ColumnTypes,
    #[serde(default)]
    classes: Vec<String>,
    intercept: Vec<f64>,
    coefficients: BTreeMap<String, Vec<f64>>,
}

/// Linear scorer over numeric, text and image features
#[derive(Debug, Clone)]
pub struct ArtifactPredictor {
    problem_type: ProblemType,
    label: String,
    column_types: ColumnTypes,
    classes: Vec<String>,
    features: Vec<String>,
    /// features x outputs
    weights: Array2<f64>,
    intercept: Array1<f64>,
}

impl ArtifactPredictor {
    /// Parse an artifact document
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: ArtifactDocument = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    fn from_document(doc: ArtifactDocument) -> Result<Self> {
        let n_outputs = match doc.problem_type {
            ProblemType::Binary if doc.classes.len() == 2 => 1,
            ProblemType::Binary => {
                return Err(ServeError::ModelLoad(format!(
                    "binary artifact needs 2 classes, found {}",
                    doc.classes.len()
                )))
            }
            ProblemType::Multiclass if doc.classes.len() >= 2 => doc.classes.len(),
            ProblemType::Multiclass => {
                return Err(ServeError::ModelLoad(format!(
                    "multiclass artifact needs at least 2 classes, found {}",
                    doc.classes.len()
                )))
            }
            _ => 1,
        };

        if doc.column_types.get(&doc.label).is_none() {
            return Err(ServeError::ModelLoad(format!(
                "label '{}' missing from column_types",
                doc.label
            )));
        }
        if doc.intercept.len() != n_outputs {
            return Err(ServeError::ModelLoad(format!(
                "intercept has {} values, expected {}",
                doc.intercept.len(),
                n_outputs
            )));
        }

        // Features follow the declared column order
        let features: Vec<String> = doc
            .column_types
            .names()
            .filter(|name| doc.coefficients.contains_key(*name))
            .map(str::to_string)
            .collect();
        if let Some(unknown) = doc
            .coefficients
            .keys()
            .find(|name| doc.column_types.get(name).is_none() || **name == doc.label)
        {
            return Err(ServeError::ModelLoad(format!(
                "coefficient for '{}' does not name a feature column",
                unknown
            )));
        }

        let mut weights = Array2::zeros((features.len(), n_outputs));
        for (row, feature) in features.iter().enumerate() {
            let coefs = &doc.coefficients[feature];
            if coefs.len() != n_outputs {
                return Err(ServeError::ModelLoad(format!(
                    "feature '{}' has {} coefficients, expected {}",
                    feature,
                    coefs.len(),
                    n_outputs
                )));
            }
            for (col, value) in coefs.iter().enumerate() {
                weights[[row, col]] = *value;
            }
        }

        Ok(Self {
            problem_type: doc.problem_type,
            label: doc.label,
            column_types: doc.column_types,
            classes: doc.classes,
            features,
            weights,
            intercept: Array1::from(doc.intercept),
        })
    }

    /// Raw linear scores, rows x outputs
    fn scores(&self, input: &ModelInput) -> Result<Array2<f64>> {
        let n_rows = input.num_rows();
        let mut x = Array2::zeros((n_rows, self.features.len()));

        for (j, feature) in self.features.iter().enumerate() {
            let values = match input {
                ModelInput::Table(df) => table_feature(df, feature)?,
                ModelInput::Images(images) => {
                    if self.column_types.image_column() == Some(feature.as_str()) {
                        images.iter().map(|img| image_intensity(img)).collect()
                    } else {
                        vec![0.0; n_rows]
                    }
                }
            };
            for (i, value) in values.into_iter().enumerate() {
                x[[i, j]] = value;
            }
        }

        Ok(x.dot(&self.weights) + &self.intercept)
    }

    fn probabilities(&self, scores: &Array2<f64>) -> Array2<f64> {
        match self.problem_type {
            ProblemType::Binary => {
                let mut proba = Array2::zeros((scores.nrows(), 2));
                for (i, logit) in scores.column(0).iter().enumerate() {
                    let p = 1.0 / (1.0 + (-logit).exp());
                    proba[[i, 0]] = 1.0 - p;
                    proba[[i, 1]] = p;
                }
                proba
            }
            _ => {
                let mut proba = scores.clone();
                for mut row in proba.axis_iter_mut(Axis(0)) {
                    let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
                    row.mapv_inplace(|v| (v - max).exp());
                    let total = row.sum();
                    row.mapv_inplace(|v| v / total);
                }
                proba
            }
        }
    }
}

impl Predictor for ArtifactPredictor {
    fn problem_type(&self) -> ProblemType {
        self.problem_type
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn column_types(&self) -> &ColumnTypes {
        &self.column_types
    }

    fn predict(&self, input: &ModelInput, kwargs: &InferenceKwargs) -> Result<Prediction> {
        if !kwargs.is_empty() {
            debug!(options = ?kwargs.keys().collect::<Vec<_>>(), "Ignoring inference options");
        }
        let scores = self.scores(input)?;

        let series = if self.problem_type.is_classification() {
            let proba = self.probabilities(&scores);
            let labels: Vec<&str> = proba
                .axis_iter(Axis(0))
                .map(|row| {
                    let best = row
                        .iter()
                        .enumerate()
                        .fold(0, |best, (idx, &p)| if p > row[best] { idx } else { best });
                    self.classes[best].as_str()
                })
                .collect();
            Series::new(self.label.as_str().into(), labels)
        } else {
            Series::new(self.label.as_str().into(), scores.column(0).to_vec())
        };
        Ok(Prediction::Series(series))
    }

    fn predict_proba(&self, input: &ModelInput, kwargs: &InferenceKwargs) -> Result<DataFrame> {
        if !self.problem_type.is_classification() {
            return Err(ServeError::Inference(format!(
                "predict_proba is not available for {} predictors",
                self.problem_type
            )));
        }
        if !kwargs.is_empty() {
            debug!(options = ?kwargs.keys().collect::<Vec<_>>(), "Ignoring inference options");
        }
        let proba = self.probabilities(&self.scores(input)?);
        let columns: Vec<Column> = self
            .classes
            .iter()
            .enumerate()
            .map(|(k, class)| Series::new(class.as_str().into(), proba.column(k).to_vec()).into())
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}

impl LoadPredictor for ArtifactPredictor {
    fn load(model_dir: &Path) -> Result<Self> {
        let path = model_dir.join(ARTIFACT_FILE);
        let json = std::fs::read_to_string(&path)
            .map_err(|e| ServeError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        let predictor = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            problem_type = %predictor.problem_type,
            label = %predictor.label,
            features = predictor.features.len(),
            "Loaded predictor artifact"
        );
        Ok(predictor)
    }
}

/// Numeric view of one feature column; missing or unparsable cells score 0
fn table_feature(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let col = df.column(name).map_err(|_| {
        ServeError::Inference(format!("input is missing feature column '{}'", name))
    })?;
    let values = match col.dtype() {
        DataType::Binary => col
            .binary()?
            .into_iter()
            .map(|cell| cell.map(image_intensity).unwrap_or(0.0))
            .collect(),
        DataType::String => col
            .str()?
            .into_iter()
            .map(|cell| cell.and_then(|s| s.trim().parse().ok()).unwrap_or(0.0))
            .collect(),
        _ => col
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|cell| cell.unwrap_or(0.0))
            .collect(),
    };
    Ok(values)
}

/// Mean byte value scaled to [0, 1]
fn image_intensity(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }
    let total: u64 = bytes.iter().map(|&b| u64::from(b)).sum();
    total as f64 / bytes.len() as f64 / 255.0
}
