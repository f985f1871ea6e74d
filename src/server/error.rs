//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::ServeError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Serve(#[from] ServeError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Serve(ServeError::UnsupportedContentType(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ServerError::Serve(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ServerError::Serve(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServerError::BadRequest(msg) => msg.clone(),
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                "An internal error occurred".to_string()
            }
            ServerError::Serve(e) if status.is_server_error() => {
                tracing::error!(detail = %e, "Inference failed");
                "Inference failed. Check server logs for details.".to_string()
            }
            ServerError::Serve(e) => e.to_string(),
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let unsupported = ServerError::from(ServeError::UnsupportedContentType("text/html".into()));
        assert_eq!(unsupported.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let mismatch = ServerError::from(ServeError::SchemaMismatch { actual: 3, expected: 2 });
        assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);

        let failed = ServerError::from(ServeError::Inference("boom".into()));
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
