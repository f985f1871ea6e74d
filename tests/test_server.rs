//! Integration test: inference host endpoints

use multimodal_serve::handler::ModelHandler;
use multimodal_serve::predictor::ArtifactPredictor;
use multimodal_serve::server::{create_router, AppState, ServerConfig};
use std::sync::Arc;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

const ARTIFACT: &str = r#"{
    "problem_type": "multiclass",
    "label": "species",
    "column_types": {"petal_length": "numerical", "petal_width": "numerical", "species": "categorical"},
    "classes": ["setosa", "versicolor", "virginica"],
    "intercept": [0.0, 0.0, 0.0],
    "coefficients": {"petal_length": [-1.0, 0.2, 1.0], "petal_width": [-1.0, 0.5, 1.0]}
}"#;

fn test_app() -> axum::Router {
    let scratch = std::env::temp_dir().join("multimodal-serve-test-scratch");
    std::fs::create_dir_all(&scratch).ok();
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        model_dir: "unused".into(),
        scratch_dir: scratch.clone(),
        max_upload_size: 1024 * 1024,
    };
    let predictor = ArtifactPredictor::from_json(ARTIFACT).unwrap();
    let handler = ModelHandler::from_predictor(Arc::new(predictor)).with_scratch_dir(scratch);
    let state = Arc::new(AppState::new(config.clone(), handler));
    create_router(state, &config)
}

fn invocation(content_type: &str, accept: Option<&str>, body: &'static [u8]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/invocations")
        .header(header::CONTENT_TYPE, content_type);
    if let Some(accept) = accept {
        builder = builder.header(header::ACCEPT, accept);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_ping() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["label"], "species");
    assert_eq!(json["model_dir"], "unused");
    assert_eq!(json["features"], serde_json::json!(["petal_length", "petal_width"]));
}

#[tokio::test]
async fn test_invocation_csv_to_json() {
    let app = test_app();
    let response = app
        .oneshot(invocation(
            "text/csv",
            Some("application/json"),
            b"petal_length,petal_width\n5.0,2.0\n-3.0,-1.0\n",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert!(response.headers().contains_key("x-request-id"));

    let json = body_json(response).await;
    assert_eq!(json["species"]["0"], "virginica");
    assert_eq!(json["species"]["1"], "setosa");
    assert!(json.get("setosa_proba").is_some());
}

#[tokio::test]
async fn test_missing_accept_defaults_to_json() {
    let app = test_app();
    let response = app
        .oneshot(invocation("text/csv", Some("*/*"), b"petal_length,petal_width\n1,1\n"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

    let app = test_app();
    let response = app
        .oneshot(invocation("text/csv", None, b"petal_length,petal_width\n1,1\n"))
        .await
        .unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
}

#[tokio::test]
async fn test_csv_output_content_type() {
    let app = test_app();
    let response = app
        .oneshot(invocation("text/csv", Some("text/csv"), b"petal_length,petal_width\n1,1\n"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"species,setosa_proba,versicolor_proba,virginica_proba\n"));
}

#[tokio::test]
async fn test_unsupported_content_type_is_415() {
    let app = test_app();
    let response = app
        .oneshot(invocation("application/xml", None, b"<rows/>"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let json = body_json(response).await;
    assert_eq!(json["error"], true);
    assert_eq!(json["message"], "application/xml content type not supported");
}

#[tokio::test]
async fn test_schema_mismatch_is_400() {
    let app = test_app();
    let response = app
        .oneshot(invocation("text/csv", None, b"1,2,3\n4,5,6\n"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(
        json["message"],
        "Invalid data format. Input data has 3 columns while the model expects 2"
    );
}

#[tokio::test]
async fn test_corrupt_envelope_is_400() {
    let app = test_app();
    let response = app
        .oneshot(invocation("application/x-autogluon-parquet", None, b"not a pickle"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().uri("/predict").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_invocations_is_405() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().uri("/invocations").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
