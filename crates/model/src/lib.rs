//! Model host and inference decoding for action recognition
//!
//! Owns the pretrained Kinetics-400 network (ONNX export) behind a
//! process-wide session loaded once at startup, and turns raw class scores
//! into labeled, confidence-scored predictions.

use ndarray::Array5;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, error, info};

use action_infer_common::{PipelineError, Prediction, Result, NUM_CLASSES};
use action_infer_labels::LabelRegistry;

/// Error types for model loading
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),

    #[error("failed to create session builder: {0}")]
    SessionBuilder(String),

    #[error("failed to load ONNX model from {path}: {error}")]
    ModelLoad { path: String, error: String },
}

/// Process-wide host for the pretrained action recognition network
///
/// Loaded exactly once at startup. A failed load leaves the host permanently
/// unavailable; there is no retry or lazy reload. Read-only after
/// construction and shared by all requests.
pub struct ModelHost {
    // ort's Session::run takes &mut self, so concurrent forward passes on
    // one session cannot be assumed safe. Inference is serialized here.
    session: Option<Mutex<Session>>,
}

impl ModelHost {
    /// Load the network from an ONNX file
    ///
    /// Never fails: a load error is logged and produces an unavailable host
    /// that rejects every inference request with `ModelUnavailable`.
    #[must_use]
    pub fn load(model_path: &Path) -> Self {
        match build_session(model_path) {
            Ok(session) => {
                info!("Action recognition model loaded from {}", model_path.display());
                Self {
                    session: Some(Mutex::new(session)),
                }
            }
            Err(e) => {
                error!("Model load error: {e}; all inference requests will be rejected");
                Self { session: None }
            }
        }
    }

    /// Whether the network loaded successfully at startup
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.session.is_some()
    }

    /// Run one forward pass over an assembled input batch tensor
    ///
    /// Returns the unnormalized per-class scores (length 400).
    ///
    /// # Errors
    ///
    /// `PipelineError::ModelUnavailable` if the model never loaded;
    /// `PipelineError::Internal` for inference failures.
    pub fn infer(&self, input: &Array5<f32>) -> Result<Vec<f32>> {
        let session = self
            .session
            .as_ref()
            .ok_or(PipelineError::ModelUnavailable)?;

        let mut session = session
            .lock()
            .map_err(|_| PipelineError::Internal("inference lock poisoned".to_string()))?;

        let input_tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| PipelineError::Internal(format!("failed to build input tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| PipelineError::Internal(format!("inference failed: {e}")))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::Internal(format!("failed to extract scores: {e}")))?;

        debug!("Model output shape: {:?}", shape);

        if data.is_empty() {
            return Err(PipelineError::Internal(
                "model produced an empty score vector".to_string(),
            ));
        }
        if data.len() != NUM_CLASSES {
            debug!(
                "Model produced {} scores (expected {})",
                data.len(),
                NUM_CLASSES
            );
        }

        Ok(data.to_vec())
    }
}

/// Create an optimized ONNX Runtime session for the model file
///
/// Configures maximum graph optimization, intra-op parallelism sized to the
/// physical core count (overridable via `ACTION_INFER_THREADS`), and a
/// CUDA-then-CPU execution provider chain.
fn build_session(model_path: &Path) -> std::result::Result<Session, ModelLoadError> {
    if !model_path.exists() {
        return Err(ModelLoadError::ModelNotFound(
            model_path.display().to_string(),
        ));
    }

    let num_threads = std::env::var("ACTION_INFER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or_else(num_cpus::get_physical);

    Session::builder()
        .map_err(|e| ModelLoadError::SessionBuilder(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| ModelLoadError::SessionBuilder(e.to_string()))?
        .with_intra_threads(num_threads)
        .map_err(|e| ModelLoadError::SessionBuilder(e.to_string()))?
        .with_memory_pattern(true)
        .map_err(|e| ModelLoadError::SessionBuilder(e.to_string()))?
        .with_execution_providers([
            CUDAExecutionProvider::default().build(),
            CPUExecutionProvider::default().build(),
        ])
        .map_err(|e| ModelLoadError::SessionBuilder(e.to_string()))?
        .commit_from_file(model_path)
        .map_err(|e| ModelLoadError::ModelLoad {
            path: model_path.display().to_string(),
            error: e.to_string(),
        })
}

/// Convert raw class scores into a probability distribution
///
/// Numerically stable: subtracts the maximum score before exponentiating.
#[must_use]
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / sum).collect()
}

/// Index of the maximum probability; ties resolve to the lowest index
fn argmax(probabilities: &[f32]) -> usize {
    let mut best_idx = 0;
    let mut best = f32::NEG_INFINITY;
    for (i, &p) in probabilities.iter().enumerate() {
        if p > best {
            best = p;
            best_idx = i;
        }
    }
    best_idx
}

/// Format a raw label for display: separators become spaces, words title-cased
#[must_use]
pub fn format_label(raw: &str) -> String {
    raw.replace(['_', '-'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode raw class scores into a labeled, confidence-scored prediction
///
/// Applies softmax, picks the winning class (ties to the lowest index),
/// resolves and formats its label, and reports confidence as a percentage
/// rounded to two decimals.
///
/// # Errors
///
/// Returns `PipelineError::Internal` if the score vector is empty.
pub fn decode_scores(scores: &[f32], registry: &LabelRegistry) -> Result<Prediction> {
    if scores.is_empty() {
        return Err(PipelineError::Internal(
            "empty score vector".to_string(),
        ));
    }

    let probabilities = softmax(scores);
    let class_index = argmax(&probabilities);
    let confidence = f64::from(probabilities[class_index]) * 100.0;

    let raw_label = registry.resolve_or_fallback(class_index);

    Ok(Prediction {
        class_index,
        action: format_label(&raw_label),
        confidence: (confidence * 100.0).round() / 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array5;

    #[test]
    fn test_softmax_sums_to_one() {
        let scores = vec![0.5, -1.2, 3.3, 0.0, 2.1];
        let probs = softmax(&scores);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3);
        assert!(probs.iter().all(|&p| p >= 0.0));
    }

    #[test]
    fn test_softmax_numerically_stable() {
        let scores = vec![1000.0, 999.0, 998.0];
        let probs = softmax(&scores);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3);
        assert!(probs.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_argmax_tie_resolves_to_lowest_index() {
        assert_eq!(argmax(&[0.1, 0.4, 0.4, 0.1]), 1);
        assert_eq!(argmax(&[0.5, 0.5]), 0);
    }

    #[test]
    fn test_format_label() {
        assert_eq!(format_label("playing_guitar"), "Playing Guitar");
        assert_eq!(format_label("riding a bike"), "Riding A Bike");
        assert_eq!(format_label("high-jump"), "High Jump");
        assert_eq!(format_label("ABSEILING"), "Abseiling");
    }

    #[test]
    fn test_decode_scores_picks_max() {
        let registry =
            LabelRegistry::from_lines(["abseiling", "air_drumming", "answering questions"]);
        let scores = vec![0.1, 2.0, 0.3];

        let prediction = decode_scores(&scores, &registry).unwrap();
        assert_eq!(prediction.class_index, 1);
        assert_eq!(prediction.action, "Air Drumming");
        assert!(prediction.confidence > 0.0 && prediction.confidence <= 100.0);
    }

    #[test]
    fn test_decode_scores_confidence_two_decimals() {
        let registry = LabelRegistry::from_lines(["a", "b"]);
        let prediction = decode_scores(&[1.0, 0.0], &registry).unwrap();

        let scaled = prediction.confidence * 100.0;
        assert!((scaled - scaled.round()).abs() < 1e-9);
    }

    #[test]
    fn test_decode_scores_label_fallback() {
        let registry = LabelRegistry::from_lines(["abseiling"]);
        let scores = vec![0.0, 0.0, 5.0];

        let prediction = decode_scores(&scores, &registry).unwrap();
        assert_eq!(prediction.class_index, 2);
        assert_eq!(prediction.action, "Class 2");
    }

    #[test]
    fn test_decode_scores_empty() {
        let registry = LabelRegistry::default();
        assert!(matches!(
            decode_scores(&[], &registry),
            Err(PipelineError::Internal(_))
        ));
    }

    #[test]
    fn test_unavailable_host_rejects_inference() {
        let host = ModelHost::load(Path::new("does_not_exist.onnx"));
        assert!(!host.is_available());

        let input = Array5::<f32>::zeros((1, 3, 16, 112, 112));
        assert!(matches!(
            host.infer(&input),
            Err(PipelineError::ModelUnavailable)
        ));
    }
}
