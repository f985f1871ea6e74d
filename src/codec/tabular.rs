//! Tabular request and response encodings
//!
//! Parquet, CSV, JSON and JSON Lines bodies are read into polars frames
//! straight from memory. JSON output uses the column-oriented layout
//! `{"column": {"0": value, ...}}` that pandas clients expect.

use polars::prelude::*;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::io::Cursor;

use crate::error::Result;

/// Read a Parquet body
pub fn read_parquet(body: &[u8]) -> Result<DataFrame> {
    Ok(ParquetReader::new(Cursor::new(body)).finish()?)
}

/// Read a headered CSV body; column types are inferred from every row
pub fn read_csv(body: &[u8]) -> Result<DataFrame> {
    Ok(CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(body))
        .finish()?)
}

/// Read a JSON document.
///
/// Accepts an array of records, a column-oriented object of index-keyed
/// objects, or a column-oriented object of arrays.
pub fn read_json(body: &[u8]) -> Result<DataFrame> {
    let document: Value = serde_json::from_slice(body)?;
    let records = match document {
        Value::Object(columns) => columns_to_records(columns),
        other => other,
    };
    let normalized = serde_json::to_vec(&records)?;
    Ok(JsonReader::new(Cursor::new(normalized))
        .with_json_format(JsonFormat::Json)
        .infer_schema_len(None)
        .finish()?)
}

/// Read newline-delimited JSON records
pub fn read_json_lines(body: &[u8]) -> Result<DataFrame> {
    Ok(JsonReader::new(Cursor::new(body))
        .with_json_format(JsonFormat::JsonLines)
        .infer_schema_len(None)
        .finish()?)
}

/// Write a frame as Parquet
pub fn write_parquet(df: &mut DataFrame) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ParquetWriter::new(&mut buf).finish(df)?;
    Ok(buf)
}

/// Write a frame as headered CSV with no row index
pub fn write_csv(df: &mut DataFrame) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf).include_header(true).finish(df)?;
    Ok(buf)
}

/// Write a frame as column-oriented JSON
pub fn write_json(df: &DataFrame) -> Result<Vec<u8>> {
    let mut document = Map::with_capacity(df.width());
    for col in df.get_columns() {
        let mut values = Map::with_capacity(col.len());
        for i in 0..col.len() {
            values.insert(i.to_string(), any_value_to_json(col.get(i)?));
        }
        document.insert(col.name().to_string(), Value::Object(values));
    }
    Ok(serde_json::to_vec(&Value::Object(document))?)
}

/// Convert `{col: {idx: v}}` or `{col: [v, ...]}` into a list of records
fn columns_to_records(columns: Map<String, Value>) -> Value {
    let positional: Vec<String>;
    let mut row_keys: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut n_positional = 0usize;
    for values in columns.values() {
        match values {
            Value::Object(indexed) => {
                for key in indexed.keys() {
                    if seen.insert(key.as_str()) {
                        row_keys.push(key.as_str());
                    }
                }
            }
            Value::Array(items) => n_positional = n_positional.max(items.len()),
            _ => n_positional = n_positional.max(1),
        }
    }
    if row_keys.is_empty() {
        positional = (0..n_positional).map(|i| i.to_string()).collect();
        row_keys = positional.iter().map(String::as_str).collect();
    }

    let records = row_keys
        .iter()
        .enumerate()
        .map(|(position, key)| {
            let record: Map<String, Value> = columns
                .iter()
                .map(|(name, values)| {
                    let value = match values {
                        Value::Object(indexed) => indexed.get(*key).cloned(),
                        Value::Array(items) => items.get(position).cloned(),
                        scalar => Some(scalar.clone()),
                    };
                    (name.clone(), value.unwrap_or(Value::Null))
                })
                .collect();
            Value::Object(record)
        })
        .collect();
    Value::Array(records)
}

fn any_value_to_json(value: AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(v) => Value::from(v),
        AnyValue::String(v) => Value::from(v),
        AnyValue::StringOwned(v) => Value::from(v.as_str()),
        AnyValue::Int8(v) => Value::from(v),
        AnyValue::Int16(v) => Value::from(v),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::UInt8(v) => Value::from(v),
        AnyValue::UInt16(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        // NaN and infinities have no JSON form
        AnyValue::Float32(v) => serde_json::Number::from_f64(f64::from(v))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AnyValue::Float64(v) => serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AnyValue::Binary(v) => Value::from(String::from_utf8_lossy(v).into_owned()),
        AnyValue::BinaryOwned(v) => Value::from(String::from_utf8_lossy(&v).into_owned()),
        other => Value::from(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        DataFrame::new(vec![
            Series::new("a".into(), &[1i64, 3]).into(),
            Series::new("b".into(), &["x", "y"]).into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_csv_example_round_trip() {
        let mut df = read_csv(b"a,b\n1,2\n").unwrap();
        let names: Vec<&str> = df.get_column_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(df.height(), 1);
        assert_eq!(write_csv(&mut df).unwrap(), b"a,b\n1,2\n");
    }

    #[test]
    fn test_read_json_records() {
        let df = read_json(br#"[{"a": 1, "b": "x"}, {"a": 3, "b": "y"}]"#).unwrap();
        assert!(df.equals(&sample()));
    }

    #[test]
    fn test_read_json_column_oriented() {
        let df = read_json(br#"{"a": {"0": 1, "1": 3}, "b": {"0": "x", "1": "y"}}"#).unwrap();
        assert!(df.equals(&sample()));

        let df = read_json(br#"{"a": [1, 3], "b": ["x", "y"]}"#).unwrap();
        assert!(df.equals(&sample()));
    }

    #[test]
    fn test_csv_types_inferred_past_first_thousand_rows() {
        let mut body = String::from("a,b\n");
        for i in 0..1000 {
            body.push_str(&format!("{},x\n", i));
        }
        body.push_str("2.5,y\n");

        let df = read_csv(body.as_bytes()).unwrap();
        assert_eq!(df.height(), 1001);
        let a = df.column("a").unwrap();
        assert_eq!(a.dtype(), &DataType::Float64);
        assert_eq!(a.f64().unwrap().get(1000), Some(2.5));
    }

    #[test]
    fn test_json_types_inferred_from_every_record() {
        let mut lines = String::new();
        for i in 0..300 {
            lines.push_str(&format!("{{\"a\": {}}}\n", i));
        }
        lines.push_str("{\"a\": 2.5}\n");
        let df = read_json_lines(lines.as_bytes()).unwrap();
        assert_eq!(df.column("a").unwrap().dtype(), &DataType::Float64);

        let records: Vec<Value> = (0..300)
            .map(|i| serde_json::json!({"a": i}))
            .chain(std::iter::once(serde_json::json!({"a": 2.5})))
            .collect();
        let df = read_json(&serde_json::to_vec(&records).unwrap()).unwrap();
        assert_eq!(df.height(), 301);
        assert_eq!(df.column("a").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_column_oriented_json_keeps_first_seen_row_order() {
        let df = read_json(br#"{"a": {"2": 5, "0": 1}, "b": {"0": "x", "2": "z", "1": "y"}}"#).unwrap();
        assert_eq!(df.height(), 3);
        let a: Vec<Option<i64>> = df.column("a").unwrap().i64().unwrap().into_iter().collect();
        let b: Vec<Option<&str>> = df.column("b").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(a, vec![Some(5), Some(1), None]);
        assert_eq!(b, vec![Some("z"), Some("x"), Some("y")]);
    }

    #[test]
    fn test_read_json_lines() {
        let df = read_json_lines(b"{\"a\": 1, \"b\": \"x\"}\n{\"a\": 3, \"b\": \"y\"}\n").unwrap();
        assert!(df.equals(&sample()));
    }

    #[test]
    fn test_write_json_is_column_oriented() {
        let json: Value = serde_json::from_slice(&write_json(&sample()).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"a": {"0": 1, "1": 3}, "b": {"0": "x", "1": "y"}}));
    }

    #[test]
    fn test_write_json_keeps_column_order() {
        let df = DataFrame::new(vec![
            Series::new("label".into(), &[1i64]).into(),
            Series::new("0_proba".into(), &[0.25f64]).into(),
        ])
        .unwrap();
        let text = String::from_utf8(write_json(&df).unwrap()).unwrap();
        assert_eq!(text, r#"{"label":{"0":1},"0_proba":{"0":0.25}}"#);
    }

    #[test]
    fn test_parquet_round_trip() {
        let mut df = sample();
        let bytes = write_parquet(&mut df).unwrap();
        assert!(bytes.starts_with(b"PAR1"));
        assert!(read_parquet(&bytes).unwrap().equals(&df));
    }

    #[test]
    fn test_malformed_json_propagates() {
        assert!(matches!(read_json(b"{not json"), Err(crate::error::ServeError::Json(_))));
    }
}
