//! Clip-to-tensor preprocessing for the action recognition network
//!
//! Three stages, each a pure function:
//! - frame sampling: pick 16 evenly-spaced frame indices from a clip
//! - frame preprocessing: resize, center-crop, channel-swap, and normalize
//!   one decoded frame into a 112x112x3 float tensor
//! - tensor assembly: stack 16 frame tensors into the (1, 3, 16, 112, 112)
//!   input batch the network expects
//!
//! The resize, crop, and normalization constants are fixed properties of the
//! pretrained network family and are not configurable.
//!
//! # Example
//! ```
//! use action_infer_preprocessing::sample_indices;
//!
//! let indices = sample_indices(32).unwrap();
//! assert_eq!(indices.len(), 16);
//! assert_eq!(indices[0], 0);
//! assert_eq!(indices[15], 31);
//! ```

use image::{imageops, ImageBuffer, Rgb};
use ndarray::{stack, Array3, Array5, Axis};
use rayon::prelude::*;
use tracing::debug;

use action_infer_common::{DecodedFrame, PipelineError, Result, NUM_FRAMES};

/// Intermediate resize width before center-cropping
pub const RESIZE_WIDTH: u32 = 171;

/// Intermediate resize height before center-cropping
pub const RESIZE_HEIGHT: u32 = 128;

/// Side length of the square center crop
pub const CROP_SIZE: u32 = 112;

/// Per-channel normalization mean (RGB order)
pub const MEAN: [f32; 3] = [0.43216, 0.394_666, 0.37645];

/// Per-channel normalization standard deviation (RGB order)
pub const STD: [f32; 3] = [0.22803, 0.22145, 0.216_989];

/// Compute the 16 frame indices to sample from a clip of `total_frames`
///
/// Indices are evenly spaced over `[0, total_frames - 1]` using truncating
/// integer division (`index[i] = i * (T - 1) / (N - 1)`), so `index[0] == 0`
/// and `index[15] == T - 1`. Deterministic for a fixed `total_frames`.
///
/// # Errors
///
/// Returns `PipelineError::ClipTooShort` when the clip has fewer than 16
/// frames.
pub fn sample_indices(total_frames: u64) -> Result<Vec<u64>> {
    if total_frames < NUM_FRAMES as u64 {
        return Err(PipelineError::ClipTooShort {
            total_frames,
            required: NUM_FRAMES,
        });
    }

    let n = NUM_FRAMES as u64;
    let indices = (0..n)
        .map(|i| i * (total_frames - 1) / (n - 1))
        .collect();
    Ok(indices)
}

/// Normalize one decoded BGR frame into a (112, 112, 3) RGB float tensor
///
/// Steps, in order: stretch-resize to 171x128 (bilinear), center-crop to
/// 112x112, BGR-to-RGB channel swap, scale to [0, 1], per-channel
/// mean/std normalization. Stateless; safe to call concurrently.
///
/// # Errors
///
/// Returns `PipelineError::Internal` if the frame buffer does not match its
/// declared dimensions.
#[allow(clippy::cast_possible_truncation)]
pub fn preprocess_frame(frame: &DecodedFrame) -> Result<Array3<f32>> {
    if frame.data.len() != frame.expected_len() {
        return Err(PipelineError::Internal(format!(
            "frame buffer size mismatch: {} bytes for {}x{}",
            frame.data.len(),
            frame.width,
            frame.height
        )));
    }

    let image: ImageBuffer<Rgb<u8>, &[u8]> =
        ImageBuffer::from_raw(frame.width, frame.height, frame.data.as_slice()).ok_or_else(
            || PipelineError::Internal("failed to wrap frame buffer".to_string()),
        )?;

    // Non-aspect-preserving stretch to the fixed intermediate size
    let resized = imageops::resize(
        &image,
        RESIZE_WIDTH,
        RESIZE_HEIGHT,
        imageops::FilterType::Triangle,
    );

    // Straight rectangular center crop, no padding
    let crop_x = (RESIZE_WIDTH - CROP_SIZE) / 2;
    let crop_y = (RESIZE_HEIGHT - CROP_SIZE) / 2;
    let cropped = imageops::crop_imm(&resized, crop_x, crop_y, CROP_SIZE, CROP_SIZE).to_image();

    let mut tensor = Array3::zeros((CROP_SIZE as usize, CROP_SIZE as usize, 3));
    for y in 0..CROP_SIZE as usize {
        for x in 0..CROP_SIZE as usize {
            // Buffer holds BGR; emit RGB
            let pixel = cropped.get_pixel(x as u32, y as u32);
            let rgb = [pixel[2], pixel[1], pixel[0]];
            for c in 0..3 {
                tensor[[y, x, c]] = (f32::from(rgb[c]) / 255.0 - MEAN[c]) / STD[c];
            }
        }
    }

    Ok(tensor)
}

/// Preprocess a sampled frame set, in parallel, preserving frame order
///
/// # Errors
///
/// Propagates the first `preprocess_frame` failure.
pub fn preprocess_frames(frames: &[DecodedFrame]) -> Result<Vec<Array3<f32>>> {
    let tensors: Result<Vec<Array3<f32>>> = frames.par_iter().map(preprocess_frame).collect();
    let tensors = tensors?;

    debug!("Preprocessed {} frames", tensors.len());
    Ok(tensors)
}

/// Stack 16 preprocessed frames into the network's input batch tensor
///
/// Stacks along a new temporal axis to (16, 112, 112, 3), reorders axes to
/// channel-first (3, 16, 112, 112), then prepends a batch dimension. The
/// axis semantics, not just the final shape, are the contract with the
/// model host; the result is materialized in standard layout.
///
/// # Errors
///
/// Returns `PipelineError::Internal` if the frame count or any frame shape
/// is wrong.
pub fn assemble(frames: &[Array3<f32>]) -> Result<Array5<f32>> {
    if frames.len() != NUM_FRAMES {
        return Err(PipelineError::Internal(format!(
            "expected {} preprocessed frames, got {}",
            NUM_FRAMES,
            frames.len()
        )));
    }

    let views: Vec<_> = frames.iter().map(|frame| frame.view()).collect();
    let stacked = stack(Axis(0), &views)
        .map_err(|e| PipelineError::Internal(format!("failed to stack frames: {e}")))?;

    // (T, H, W, C) -> (C, T, H, W) -> (1, C, T, H, W)
    let batch = stacked
        .permuted_axes([3, 0, 1, 2])
        .insert_axis(Axis(0))
        .as_standard_layout()
        .to_owned();

    debug!("Assembled input batch tensor with shape {:?}", batch.shape());
    Ok(batch)
}
