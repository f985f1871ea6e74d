//! Request and response content types
//!
//! Input tags are matched exactly; response types are negotiated by
//! substring against the caller's accept string.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ServeError;

/// Encoding of an inbound request body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InputContentType {
    Parquet,
    Csv,
    Json,
    JsonLines,
    Npy,
    AutogluonParquet,
    AutogluonNpy,
    Image,
}

impl InputContentType {
    pub const ALL: [InputContentType; 8] = [
        InputContentType::Parquet,
        InputContentType::Csv,
        InputContentType::Json,
        InputContentType::JsonLines,
        InputContentType::Npy,
        InputContentType::AutogluonParquet,
        InputContentType::AutogluonNpy,
        InputContentType::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InputContentType::Parquet => "application/x-parquet",
            InputContentType::Csv => "text/csv",
            InputContentType::Json => "application/json",
            InputContentType::JsonLines => "application/jsonl",
            InputContentType::Npy => "application/x-npy",
            InputContentType::AutogluonParquet => "application/x-autogluon-parquet",
            InputContentType::AutogluonNpy => "application/x-autogluon-npy",
            InputContentType::Image => "application/x-image",
        }
    }
}

impl FromStr for InputContentType {
    type Err = ServeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ct| ct.as_str() == s)
            .ok_or_else(|| ServeError::UnsupportedContentType(s.to_string()))
    }
}

impl fmt::Display for InputContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoding of a response body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum OutputContentType {
    Parquet,
    #[default]
    Json,
    Csv,
}

impl OutputContentType {
    /// Pick the response encoding from an accept string.
    ///
    /// Candidates are tried in a fixed order and the first one contained
    /// anywhere in `accept` wins.
    pub fn negotiate(accept: &str) -> Result<Self, ServeError> {
        [
            OutputContentType::Parquet,
            OutputContentType::Json,
            OutputContentType::Csv,
        ]
        .into_iter()
        .find(|ct| accept.contains(ct.as_str()))
        .ok_or_else(|| ServeError::UnsupportedContentType(accept.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputContentType::Parquet => "application/x-parquet",
            OutputContentType::Json => "application/json",
            OutputContentType::Csv => "text/csv",
        }
    }
}

impl fmt::Display for OutputContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_input_tag() {
        for ct in InputContentType::ALL {
            assert_eq!(ct.as_str().parse::<InputContentType>().unwrap(), ct);
        }
    }

    #[test]
    fn test_unknown_input_tag_rejected() {
        let err = "application/xml".parse::<InputContentType>().unwrap_err();
        assert!(matches!(err, ServeError::UnsupportedContentType(ref s) if s == "application/xml"));
    }

    #[test]
    fn test_input_tag_match_is_exact() {
        assert!("text/csv; charset=utf-8".parse::<InputContentType>().is_err());
        assert!("TEXT/CSV".parse::<InputContentType>().is_err());
    }

    #[test]
    fn test_negotiate_by_substring() {
        assert_eq!(
            OutputContentType::negotiate("application/json; charset=utf-8").unwrap(),
            OutputContentType::Json
        );
        assert_eq!(
            OutputContentType::negotiate("text/csv").unwrap(),
            OutputContentType::Csv
        );
        assert_eq!(
            OutputContentType::negotiate("application/x-parquet").unwrap(),
            OutputContentType::Parquet
        );
    }

    #[test]
    fn test_negotiate_prefers_parquet_then_json() {
        let accept = "text/csv, application/json, application/x-parquet";
        assert_eq!(OutputContentType::negotiate(accept).unwrap(), OutputContentType::Parquet);
        let accept = "text/csv, application/json";
        assert_eq!(OutputContentType::negotiate(accept).unwrap(), OutputContentType::Json);
    }

    #[test]
    fn test_negotiate_unsupported() {
        assert!(matches!(
            OutputContentType::negotiate("application/xml"),
            Err(ServeError::UnsupportedContentType(_))
        ));
    }
}
