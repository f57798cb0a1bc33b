//! API Server Binary Entry Point

use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use action_infer_api_server::{start_server, ApiState};
use action_infer_labels::LabelRegistry;
use action_infer_model::ModelHost;

const DEFAULT_LABELS_URL: &str =
    "https://raw.githubusercontent.com/deepmind/kinetics-i3d/master/data/label_map.txt";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "action_infer_api_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration from environment
    let addr = std::env::var("ACTION_INFER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let model_path = PathBuf::from(
        std::env::var("ACTION_INFER_MODEL").unwrap_or_else(|_| "models/r3d_18.onnx".to_string()),
    );
    let labels_path = PathBuf::from(
        std::env::var("ACTION_INFER_LABELS").unwrap_or_else(|_| "kinetics_labels.txt".to_string()),
    );
    let labels_url =
        std::env::var("ACTION_INFER_LABELS_URL").unwrap_or_else(|_| DEFAULT_LABELS_URL.to_string());

    // Build startup services: label table first (degrades gracefully), then
    // the model host (an unavailable host still serves, rejecting inference)
    let labels = LabelRegistry::load(&labels_path, &labels_url).await;
    let host = tokio::task::spawn_blocking(move || ModelHost::load(&model_path)).await?;

    let state = ApiState::new(host, labels);

    tracing::info!("Starting Action Inference API Server");
    start_server(&addr, state).await?;

    Ok(())
}
