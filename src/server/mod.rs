//! SageMaker-compatible inference host
//!
//! Serves `GET /ping` and `POST /invocations` over a single loaded
//! [`ModelHandler`](crate::handler::ModelHandler).

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::handler::ModelHandler;
use crate::predictor::ArtifactPredictor;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: ["SAGEMAKER_BIND_TO_PORT", "API_PORT"]
                .iter()
                .find_map(|key| std::env::var(key).ok()?.parse().ok())
                .unwrap_or(8080),
            model_dir: ["SM_MODEL_DIR", "MODEL_DIR"]
                .iter()
                .find_map(|key| std::env::var(key).ok())
                .unwrap_or_else(|| "/opt/ml/model".to_string())
                .into(),
            scratch_dir: std::env::var("SCRATCH_DIR")
                .unwrap_or_else(|_| ".".to_string())
                .into(),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100 * 1024 * 1024), // 100MB
        }
    }
}

/// Load the model from `config.model_dir` and serve until ctrl+c
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(
        model_dir = %config.model_dir.display(),
        scratch_dir = %config.scratch_dir.display(),
        started_at = %start_time.to_rfc3339(),
        "Loading model"
    );

    if !config.scratch_dir.is_dir() {
        warn!(scratch_dir = %config.scratch_dir.display(), "Scratch directory not found, image cleanup will be skipped");
    }

    let model_dir = config.model_dir.clone();
    let handler = tokio::task::spawn_blocking(move || ModelHandler::load::<ArtifactPredictor>(model_dir))
        .await??
        .with_scratch_dir(config.scratch_dir.clone());

    let state = Arc::new(AppState::new(config.clone(), handler));
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        host = %config.host,
        port = config.port,
        address = %addr,
        max_upload_size_mb = config.max_upload_size / 1024 / 1024,
        started_at = %start_time.to_rfc3339(),
        "Inference server starting"
    );
    info!(url = %format!("http://{}/ping", addr), "Health endpoint available");
    info!(url = %format!("http://{}/invocations", addr), "Invocation endpoint available");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
        let stop_time = chrono::Utc::now();
        let uptime = stop_time.signed_duration_since(start_time);
        info!(
            stopped_at = %stop_time.to_rfc3339(),
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    info!("Server started successfully (press ctrl+c to stop)");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
