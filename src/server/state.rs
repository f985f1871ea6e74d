//! Application state management

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::handler::ModelHandler;

use super::ServerConfig;

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    pub handler: Arc<ModelHandler>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    invocations: AtomicU64,
}

impl AppState {
    pub fn new(config: ServerConfig, handler: ModelHandler) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
            started_at: chrono::Utc::now(),
            invocations: AtomicU64::new(0),
        }
    }

    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()[..8].to_string()
    }

    /// Count one invocation and return the running total
    pub fn record_invocation(&self) -> u64 {
        self.invocations.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn invocation_count(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }
}
