//! Video decoder module
//!
//! Opens a clip, reports its frame count, and extracts decoded frames at a
//! caller-supplied set of frame indices with pixel format conversion.

use ffmpeg_next as ffmpeg;
use std::path::Path;
use tracing::debug;

use action_infer_common::{DecodedFrame, PipelineError, Result};

/// Pixel format for decoded frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// BGR 24-bit packed, the decoder's native output order for this pipeline
    Bgr24,
    /// RGB 24-bit packed
    Rgb24,
}

impl PixelFormat {
    /// Convert to `FFmpeg` pixel format
    fn to_ffmpeg_format(self) -> ffmpeg::format::Pixel {
        match self {
            PixelFormat::Bgr24 => ffmpeg::format::Pixel::BGR24,
            PixelFormat::Rgb24 => ffmpeg::format::Pixel::RGB24,
        }
    }
}

/// Initialize `FFmpeg` library
fn init_ffmpeg() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        ffmpeg::init().expect("Failed to initialize FFmpeg");
    });
}

/// Report the total number of frames in the clip's video stream
///
/// Uses the container's frame-count metadata when present, falling back to an
/// estimate from stream duration and average frame rate.
///
/// # Errors
///
/// Returns `PipelineError::Decode` if the file cannot be opened or holds no
/// video stream.
#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
pub fn probe_frame_count(input_path: &Path) -> Result<u64> {
    init_ffmpeg();

    let ictx = ffmpeg::format::input(&input_path)
        .map_err(|e| PipelineError::Decode(format!("failed to open input file: {e}")))?;

    let video_stream = ictx
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or_else(|| PipelineError::Decode("no video stream found".to_string()))?;

    let frames = video_stream.frames();
    if frames > 0 {
        return Ok(frames as u64);
    }

    // Metadata count missing (some containers); estimate from duration * fps
    let duration_secs = ictx.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE);
    let rate = video_stream.avg_frame_rate();
    let fps = if rate.1 > 0 {
        f64::from(rate.0) / f64::from(rate.1)
    } else {
        0.0
    };

    let estimated = (duration_secs * fps).round();
    debug!(
        "Frame count metadata absent, estimated {} frames ({}s at {:.2} fps)",
        estimated, duration_secs, fps
    );

    if estimated > 0.0 {
        Ok(estimated as u64)
    } else {
        Ok(0)
    }
}

/// Decode the frames at `indices` (sorted, non-decreasing frame numbers)
///
/// Decodes sequentially and keeps only the requested frames, converting each
/// to the requested packed pixel format at native resolution. Repeated
/// indices produce repeated frames in the output. Returns however many of the
/// requested frames were actually decodable; the caller decides whether a
/// shortfall is fatal.
///
/// # Errors
///
/// Returns `PipelineError::Decode` if the file cannot be opened, holds no
/// video stream, or frame conversion fails.
pub fn extract_frames(
    input_path: &Path,
    indices: &[u64],
    format: PixelFormat,
) -> Result<Vec<DecodedFrame>> {
    init_ffmpeg();

    let mut ictx = ffmpeg::format::input(&input_path)
        .map_err(|e| PipelineError::Decode(format!("failed to open input file: {e}")))?;

    let video_stream = ictx
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or_else(|| PipelineError::Decode("no video stream found".to_string()))?;

    let stream_index = video_stream.index();
    let codec_params = video_stream.parameters();

    let mut decoder = ffmpeg::codec::context::Context::from_parameters(codec_params)
        .map_err(|e| PipelineError::Decode(format!("failed to create context: {e}")))?
        .decoder()
        .video()
        .map_err(|e| PipelineError::Decode(format!("failed to create decoder: {e}")))?;

    let width = decoder.width();
    let height = decoder.height();
    let src_format = decoder.format();

    let mut scaler = ffmpeg::software::scaling::Context::get(
        src_format,
        width,
        height,
        format.to_ffmpeg_format(),
        width,
        height,
        ffmpeg::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| PipelineError::Decode(format!("failed to create scaler: {e}")))?;

    let mut frames = Vec::with_capacity(indices.len());
    let mut cursor = 0usize;
    let mut frame_number = 0u64;
    let mut decoded_frame = ffmpeg::util::frame::video::Video::empty();
    let mut converted_frame = ffmpeg::util::frame::video::Video::empty();

    'packets: for (stream, packet) in ictx.packets() {
        if stream.index() != stream_index {
            continue;
        }

        if decoder.send_packet(&packet).is_ok() {
            while decoder.receive_frame(&mut decoded_frame).is_ok() {
                // Repeated indices duplicate the frame
                while cursor < indices.len() && indices[cursor] == frame_number {
                    scaler
                        .run(&decoded_frame, &mut converted_frame)
                        .map_err(|e| {
                            PipelineError::Decode(format!("failed to convert frame: {e}"))
                        })?;

                    frames.push(DecodedFrame {
                        frame_number,
                        width,
                        height,
                        data: copy_frame_data(&converted_frame),
                    });
                    cursor += 1;
                }
                frame_number += 1;

                if cursor >= indices.len() {
                    break 'packets;
                }
            }
        }
    }

    // Flush decoder for any buffered frames
    if cursor < indices.len() {
        decoder.send_eof().ok();
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            while cursor < indices.len() && indices[cursor] == frame_number {
                scaler
                    .run(&decoded_frame, &mut converted_frame)
                    .map_err(|e| PipelineError::Decode(format!("failed to convert frame: {e}")))?;

                frames.push(DecodedFrame {
                    frame_number,
                    width,
                    height,
                    data: copy_frame_data(&converted_frame),
                });
                cursor += 1;
            }
            frame_number += 1;

            if cursor >= indices.len() {
                break;
            }
        }
    }

    debug!(
        "Decoded {} of {} requested frames from {}",
        frames.len(),
        indices.len(),
        input_path.display()
    );

    Ok(frames)
}

/// Copy packed 3-byte-per-pixel frame data to a contiguous buffer
fn copy_frame_data(frame: &ffmpeg::util::frame::video::Video) -> Vec<u8> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let stride = frame.stride(0);
    let plane_data = frame.data(0);

    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row_start = y * stride;
        let row_end = row_start + (width * 3);
        data.extend_from_slice(&plane_data[row_start..row_end]);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_pixel_format_conversion() {
        assert_eq!(
            PixelFormat::Bgr24.to_ffmpeg_format(),
            ffmpeg::format::Pixel::BGR24
        );
        assert_eq!(
            PixelFormat::Rgb24.to_ffmpeg_format(),
            ffmpeg::format::Pixel::RGB24
        );
    }

    #[test]
    fn test_probe_missing_file() {
        let result = probe_frame_count(Path::new("does_not_exist.mp4"));
        assert!(matches!(result, Err(PipelineError::Decode(_))));
    }

    #[test]
    fn test_probe_garbage_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not a video container").unwrap();
        file.flush().unwrap();

        let result = probe_frame_count(file.path());
        assert!(matches!(result, Err(PipelineError::Decode(_))));
    }

    #[test]
    fn test_extract_garbage_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 512]).unwrap();
        file.flush().unwrap();

        let result = extract_frames(file.path(), &[0, 1, 2], PixelFormat::Bgr24);
        assert!(matches!(result, Err(PipelineError::Decode(_))));
    }
}
