//! Common types shared across the action inference pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of frames sampled from every clip
pub const NUM_FRAMES: usize = 16;

/// Number of action classes the pretrained network predicts
pub const NUM_CLASSES: usize = 400;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("model is not loaded")]
    ModelUnavailable,

    #[error("clip too short: {total_frames} frames (minimum {required})")]
    ClipTooShort { total_frames: u64, required: usize },

    #[error("frame extraction failed: decoded {got} of {expected} sampled frames")]
    FrameExtraction { expected: usize, got: usize },

    #[error("video decode error: {0}")]
    Decode(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Internal(err.to_string())
    }
}

impl PipelineError {
    /// Whether the caller can recover by supplying a different clip
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::ClipTooShort { .. }
                | PipelineError::FrameExtraction { .. }
                | PipelineError::Decode(_)
        )
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// One decoded video frame in the decoder's native channel order
///
/// `data` is packed row-major, 3 bytes per pixel, without row padding.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Frame number (0-indexed)
    pub frame_number: u64,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Packed pixel data
    pub data: Vec<u8>,
}

impl DecodedFrame {
    /// Expected byte length for the frame dimensions
    #[must_use]
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Classification result for one clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Index of the winning class
    pub class_index: usize,
    /// Display-formatted label for the winning class
    pub action: String,
    /// Confidence as a percentage, rounded to two decimals
    pub confidence: f64,
}
