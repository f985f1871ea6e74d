//! Inference dispatch
//!
//! Classification tasks go through `predict_proba`; the class prediction is
//! derived from the probabilities and returned alongside them. Every other
//! task uses the single-output `predict` path.

use polars::prelude::*;
use std::time::Instant;
use tracing::debug;

use crate::error::{Result, ServeError};
use crate::predictor::{ModelInput, Predictor, ProblemType};
use super::config::{InferenceKwargs, DEFAULT_DECISION_THRESHOLD};

/// Suffix appended to every class label in the probability columns
pub const PROBA_SUFFIX: &str = "_proba";

/// Run the predictor and shape its output into one result table
pub fn run_inference(
    predictor: &dyn Predictor,
    input: &ModelInput,
    kwargs: &InferenceKwargs,
) -> Result<DataFrame> {
    let start = Instant::now();
    let problem_type = predictor.problem_type();
    let result = assemble(predictor, input, kwargs).map_err(ServeError::during_inference)?;

    debug!(
        problem_type = %problem_type,
        rows = input.num_rows(),
        output_columns = result.width(),
        latency_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Inference complete"
    );
    Ok(result)
}

fn assemble(
    predictor: &dyn Predictor,
    input: &ModelInput,
    kwargs: &InferenceKwargs,
) -> Result<DataFrame> {
    let problem_type = predictor.problem_type();
    let result = if problem_type.is_classification() {
        let proba = predictor.predict_proba(input, kwargs)?;
        let mut prediction = derive_prediction(&proba, problem_type)?;
        prediction.rename(predictor.label().into());

        let mut columns: Vec<Column> = Vec::with_capacity(proba.width() + 1);
        columns.push(prediction.into());
        for col in proba.get_columns() {
            let mut col = col.clone();
            col.rename(format!("{}{}", col.name(), PROBA_SUFFIX).into());
            columns.push(col);
        }
        DataFrame::new(columns)?
    } else {
        predictor.predict(input, kwargs)?.into_frame()?
    };
    Ok(result)
}

/// Pick the predicted class for each row of a probability table.
///
/// Binary tasks choose the second (positive) class when its probability
/// reaches the decision threshold; multiclass tasks take the argmax, the
/// leftmost class winning ties. Class labels that all parse as integers
/// produce an integer column.
pub fn derive_prediction(proba: &DataFrame, problem_type: ProblemType) -> Result<Series> {
    let classes: Vec<String> = proba
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    match (problem_type, classes.len()) {
        (ProblemType::Binary, 2) => {}
        (ProblemType::Binary, n) => {
            return Err(ServeError::Inference(format!(
                "binary predictor returned {} probability columns, expected 2",
                n
            )))
        }
        (_, 0) => {
            return Err(ServeError::Inference(
                "predictor returned no probability columns".to_string(),
            ))
        }
        _ => {}
    }

    let columns: Vec<Float64Chunked> = proba
        .get_columns()
        .iter()
        .map(|col| Ok(col.cast(&DataType::Float64)?.f64()?.clone()))
        .collect::<Result<_>>()?;

    let winners: Vec<usize> = (0..proba.height())
        .map(|row| {
            let p = |idx: usize| columns[idx].get(row).unwrap_or(f64::NAN);
            if problem_type == ProblemType::Binary {
                usize::from(p(1) >= DEFAULT_DECISION_THRESHOLD)
            } else {
                let mut best = 0;
                for idx in 1..columns.len() {
                    if p(idx) > p(best) {
                        best = idx;
                    }
                }
                best
            }
        })
        .collect();

    let as_ints: Option<Vec<i64>> = classes.iter().map(|c| c.parse::<i64>().ok()).collect();
    let series = match as_ints {
        Some(ints) => {
            let values: Vec<i64> = winners.iter().map(|&w| ints[w]).collect();
            Series::new(PlSmallStr::EMPTY, values)
        }
        None => {
            let values: Vec<&str> = winners.iter().map(|&w| classes[w].as_str()).collect();
            Series::new(PlSmallStr::EMPTY, values)
        }
    };
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{ColumnType, ColumnTypes, Prediction};

    struct FixedPredictor {
        problem_type: ProblemType,
        column_types: ColumnTypes,
        proba: DataFrame,
    }

    impl FixedPredictor {
        fn classifier(problem_type: ProblemType, proba: DataFrame) -> Self {
            Self {
                problem_type,
                column_types: ColumnTypes::new()
                    .with("x", ColumnType::Numerical)
                    .with("target", ColumnType::Categorical),
                proba,
            }
        }
    }

    impl Predictor for FixedPredictor {
        fn problem_type(&self) -> ProblemType {
            self.problem_type
        }

        fn label(&self) -> &str {
            "target"
        }

        fn column_types(&self) -> &ColumnTypes {
            &self.column_types
        }

        fn predict(&self, _input: &ModelInput, _kwargs: &InferenceKwargs) -> Result<Prediction> {
            Ok(Prediction::Series(Series::new("target".into(), &[1.5f64, 2.5])))
        }

        fn predict_proba(&self, _input: &ModelInput, _kwargs: &InferenceKwargs) -> Result<DataFrame> {
            Ok(self.proba.clone())
        }
    }

    fn input() -> ModelInput {
        ModelInput::Table(df!("x" => &[1.0f64, 2.0]).unwrap())
    }

    #[test]
    fn test_multiclass_result_layout() {
        let proba = df!(
            "cat" => &[0.7f64, 0.1],
            "dog" => &[0.2f64, 0.3],
            "fish" => &[0.1f64, 0.6]
        )
        .unwrap();
        let predictor = FixedPredictor::classifier(ProblemType::Multiclass, proba);
        let result = run_inference(&predictor, &input(), &InferenceKwargs::new()).unwrap();

        let names: Vec<&str> = result.get_column_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["target", "cat_proba", "dog_proba", "fish_proba"]);
        let labels: Vec<Option<&str>> = result.column("target").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(labels, vec![Some("cat"), Some("fish")]);
    }

    #[test]
    fn test_binary_threshold_and_integer_labels() {
        let proba = df!("0" => &[0.5f64, 0.9], "1" => &[0.5f64, 0.1]).unwrap();
        let predictor = FixedPredictor::classifier(ProblemType::Binary, proba);
        let result = run_inference(&predictor, &input(), &InferenceKwargs::new()).unwrap();

        let target = result.column("target").unwrap();
        assert_eq!(target.dtype(), &DataType::Int64);
        let labels: Vec<Option<i64>> = target.i64().unwrap().into_iter().collect();
        assert_eq!(labels, vec![Some(1), Some(0)]);
        assert!(result.column("1_proba").is_ok());
    }

    #[test]
    fn test_multiclass_tie_goes_to_first_class() {
        let proba = df!("a" => &[0.4f64], "b" => &[0.4f64], "c" => &[0.2f64]).unwrap();
        let winner = derive_prediction(&proba, ProblemType::Multiclass).unwrap();
        assert_eq!(winner.str().unwrap().get(0), Some("a"));
    }

    #[test]
    fn test_binary_requires_two_columns() {
        let proba = df!("a" => &[1.0f64]).unwrap();
        let err = derive_prediction(&proba, ProblemType::Binary).unwrap_err();
        assert!(matches!(err, ServeError::Inference(_)));
    }

    #[test]
    fn test_regression_wraps_series() {
        let predictor = FixedPredictor {
            problem_type: ProblemType::Regression,
            column_types: ColumnTypes::new(),
            proba: DataFrame::empty(),
        };
        let result = run_inference(&predictor, &input(), &InferenceKwargs::new()).unwrap();
        assert_eq!(result.shape(), (2, 1));
        assert_eq!(result.get_column_names()[0].as_str(), "target");
    }

    struct FailingPredictor(ColumnTypes);

    impl Predictor for FailingPredictor {
        fn problem_type(&self) -> ProblemType {
            ProblemType::Binary
        }

        fn label(&self) -> &str {
            "target"
        }

        fn column_types(&self) -> &ColumnTypes {
            &self.0
        }

        fn predict(&self, _input: &ModelInput, _kwargs: &InferenceKwargs) -> Result<Prediction> {
            Err(PolarsError::ComputeError("predict failed".into()).into())
        }

        fn predict_proba(&self, _input: &ModelInput, _kwargs: &InferenceKwargs) -> Result<DataFrame> {
            Err(PolarsError::ComputeError("lengths don't match".into()).into())
        }
    }

    #[test]
    fn test_predictor_polars_failure_is_inference_error() {
        let predictor = FailingPredictor(ColumnTypes::new());
        let err = run_inference(&predictor, &input(), &InferenceKwargs::new()).unwrap_err();
        assert!(matches!(err, ServeError::Inference(ref msg) if msg.contains("lengths don't match")));
        assert!(!err.is_client_error());
    }
}
