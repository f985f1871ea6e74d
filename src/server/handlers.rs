//! HTTP request handlers

use std::sync::Arc;
use std::time::Instant;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::content_type::OutputContentType;
use crate::error::ServeError;

use super::error::{Result, ServerError};
use super::state::AppState;

/// Accept value that leaves the output type to the server
const ANY_MEDIA_TYPE: &str = "*/*";

/// Liveness probe; the model is loaded before the router exists
pub async fn ping(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let predictor = state.handler.predictor();
    let uptime = chrono::Utc::now().signed_duration_since(state.started_at);
    Json(serde_json::json!({
        "status": "healthy",
        "problem_type": predictor.problem_type().to_string(),
        "label": predictor.label(),
        "model_dir": state.config.model_dir.display().to_string(),
        "features": state.handler.schema().names(),
        "uptime_secs": uptime.num_seconds(),
        "invocations": state.invocation_count(),
    }))
}

/// Run one transform; `Content-Type` names the input, `Accept` the output
pub async fn invocations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let request_id = AppState::generate_id();
    let content_type = header_str(&headers, header::CONTENT_TYPE)
        .ok_or_else(|| ServeError::UnsupportedContentType("missing".to_string()))?
        .to_string();
    let accept = match header_str(&headers, header::ACCEPT) {
        None | Some(ANY_MEDIA_TYPE) => OutputContentType::Json.as_str().to_string(),
        Some(accept) => accept.to_string(),
    };

    let start = Instant::now();
    let handler = Arc::clone(&state.handler);
    let body_bytes = body.len();
    let (output, output_type) = tokio::task::spawn_blocking(move || {
        handler.transform(&body, &content_type, &accept)
    })
    .await
    .map_err(|e| ServerError::Internal(format!("Transform task failed: {}", e)))??;

    let count = state.record_invocation();
    info!(
        request_id = %request_id,
        output_type = %output_type,
        body_bytes,
        output_bytes = output.len(),
        latency_ms = start.elapsed().as_secs_f64() * 1000.0,
        invocations = count,
        "Invocation complete"
    );

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(output_type.as_str())),
            (
                header::HeaderName::from_static("x-request-id"),
                HeaderValue::from_str(&request_id)
                    .map_err(|e| ServerError::Internal(e.to_string()))?,
            ),
        ],
        output,
    )
        .into_response())
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
