//! Schema reconciliation
//!
//! Aligns decoded tables with the feature columns the predictor was trained
//! on and decodes the image column, if the predictor declares one.

use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::codec::base85;
use crate::error::{Result, ServeError};
use crate::predictor::ColumnTypes;

/// Ordered feature-column names expected by the predictor, label excluded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    names: Vec<String>,
}

impl ColumnSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Derive the schema from declared column types by dropping the label
    pub fn from_column_types(column_types: &ColumnTypes, label: &str) -> Self {
        Self {
            names: column_types
                .names()
                .filter(|name| *name != label)
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether the table's columns are exactly the schema's, in any order
    pub fn matches(&self, df: &DataFrame) -> bool {
        let mut actual: Vec<&str> = df.get_column_names().iter().map(|s| s.as_str()).collect();
        let mut expected: Vec<&str> = self.names.iter().map(String::as_str).collect();
        actual.sort_unstable();
        expected.sort_unstable();
        actual == expected
    }

    /// Return the table labelled with the schema's columns.
    ///
    /// A table whose column names do not match is taken to have been sent
    /// without a header: its parsed header row is pushed back in as the
    /// first data row and the schema names are applied in order.
    pub fn reconcile(&self, df: DataFrame) -> Result<DataFrame> {
        if self.matches(&df) {
            return Ok(df);
        }
        if df.width() != self.len() {
            return Err(ServeError::SchemaMismatch {
                actual: df.width(),
                expected: self.len(),
            });
        }

        let columns = df
            .get_columns()
            .iter()
            .zip(&self.names)
            .map(|(col, name)| restack_header(col, name))
            .collect::<Result<Vec<_>>>()?;
        Ok(DataFrame::new(columns)?)
    }
}

/// Prepend a column's own header to its values under a new name
fn restack_header(col: &Column, name: &str) -> Result<Column> {
    let as_text = col.cast(&DataType::String)?;
    let values = as_text.str()?;
    let stacked: StringChunked = std::iter::once(Some(col.name().as_str()))
        .chain(values.into_iter())
        .collect();
    let series = stacked.into_series().with_name(name.into());
    Ok(narrow_text(series).into())
}

/// Recover a numeric dtype for text that parses cleanly
fn narrow_text(series: Series) -> Series {
    [DataType::Int64, DataType::Float64]
        .iter()
        .find_map(|dtype| series.strict_cast(dtype).ok())
        .unwrap_or(series)
}

/// Replace the predictor's image column, if present, with decoded bytes.
///
/// Only the first image-typed column in declaration order is decoded; its
/// cells must be base85 text.
pub fn decode_image_column(mut df: DataFrame, column_types: &ColumnTypes) -> Result<DataFrame> {
    let Some(image_column) = column_types.image_column() else {
        return Ok(df);
    };
    let Ok(col) = df.column(image_column) else {
        return Ok(df);
    };
    info!(image_column = %image_column, "Detected image column");

    // Parquet clients may send the base85 text as raw bytes
    let decoded = match col.dtype() {
        DataType::Binary => decode_cells(col.binary()?.into_iter())?,
        _ => {
            let text = col.cast(&DataType::String)?;
            decode_cells(text.str()?.into_iter().map(|cell| cell.map(str::as_bytes)))?
        }
    };

    let binary: BinaryChunked = decoded
        .iter()
        .map(|cell| cell.as_deref())
        .collect();
    df.with_column(binary.into_series().with_name(image_column.into()))?;
    Ok(df)
}

fn decode_cells<'a>(cells: impl Iterator<Item = Option<&'a [u8]>>) -> Result<Vec<Option<Vec<u8>>>> {
    cells
        .map(|cell| Ok(cell.map(base85::decode).transpose()?))
        .collect()
}
