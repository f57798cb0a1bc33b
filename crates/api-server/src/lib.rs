//! REST API server for action clip classification
//!
//! Exposes the inference entry point over HTTP: one multipart upload in, one
//! labeled, confidence-scored prediction out. The model host and label
//! registry are built once at startup and shared read-only across requests;
//! no presentation markup is served here.

mod handlers;
mod types;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use action_infer_labels::LabelRegistry;
use action_infer_model::ModelHost;

pub use handlers::*;
pub use types::*;

/// Maximum accepted upload size in bytes
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// API server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// Pretrained network, loaded once at startup
    pub host: Arc<ModelHost>,
    /// Class label table, immutable after load
    pub labels: Arc<LabelRegistry>,
}

impl ApiState {
    /// Create new API state from startup-constructed services
    #[must_use]
    pub fn new(host: ModelHost, labels: LabelRegistry) -> Self {
        Self {
            host: Arc::new(host),
            labels: Arc::new(labels),
        }
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Inference entry point
        .route("/analyze", post(analyze))
        // Middleware
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("Starting API server on {}", addr);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await
}
