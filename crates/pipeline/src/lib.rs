//! Request orchestration for clip classification
//!
//! Sequences the full video-to-prediction pipeline over one stored clip:
//! probe, validate, sample, extract, preprocess, assemble, infer, decode.
//! Each stage fails closed with a typed error; nothing is caught here. The
//! transport boundary owns the clip's temp storage and its cleanup, and is
//! the only place errors are converted to responses.

use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use action_infer_common::{PipelineError, Prediction, Result, NUM_FRAMES};
use action_infer_decoder::{extract_frames, probe_frame_count, PixelFormat};
use action_infer_labels::LabelRegistry;
use action_infer_model::{decode_scores, ModelHost};
use action_infer_preprocessing::{assemble, preprocess_frames, sample_indices};

/// Classify the clip stored at `path`
///
/// Synchronous and CPU-bound; callers on an async runtime should dispatch
/// this onto a blocking worker pool. The clip file is read but never
/// modified or removed here.
///
/// # Errors
///
/// - `ModelUnavailable` if the network never loaded (checked up front, so a
///   dead host does no decode work)
/// - `ClipTooShort` when the clip has fewer than 16 frames
/// - `FrameExtraction` when fewer than 16 frames decode at the sampled
///   indices
/// - `Decode` when the clip cannot be opened or read
/// - `Internal` for any other pipeline failure
pub fn classify_clip(
    path: &Path,
    registry: &LabelRegistry,
    host: &ModelHost,
) -> Result<Prediction> {
    if !host.is_available() {
        return Err(PipelineError::ModelUnavailable);
    }

    let start = Instant::now();

    let total_frames = probe_frame_count(path)?;
    debug!("Clip reports {} frames", total_frames);

    let indices = sample_indices(total_frames)?;

    let frames = extract_frames(path, &indices, PixelFormat::Bgr24)?;
    if frames.len() < NUM_FRAMES {
        return Err(PipelineError::FrameExtraction {
            expected: NUM_FRAMES,
            got: frames.len(),
        });
    }

    let tensors = preprocess_frames(&frames)?;
    let batch = assemble(&tensors)?;

    let scores = host.infer(&batch)?;
    let prediction = decode_scores(&scores, registry)?;

    info!(
        "Classified clip as {:?} ({:.2}% confidence) in {:.2}ms",
        prediction.action,
        prediction.confidence,
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(prediction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_model_short_circuits() {
        let registry = LabelRegistry::default();
        let host = ModelHost::load(Path::new("no_such_model.onnx"));

        // The path does not exist; an unavailable host must still win,
        // proving no decode work happens before the availability check.
        let result = classify_clip(Path::new("no_such_clip.mp4"), &registry, &host);
        assert!(matches!(result, Err(PipelineError::ModelUnavailable)));
    }
}
