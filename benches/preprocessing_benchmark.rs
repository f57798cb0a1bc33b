// Preprocessing benchmark - measure per-frame normalize and batch assembly time
//
// Run with: cargo bench --bench preprocessing_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use action_infer_common::{DecodedFrame, NUM_FRAMES};
use action_infer_preprocessing::{assemble, preprocess_frame, preprocess_frames};

/// Create a synthetic decoded frame with a deterministic pixel pattern
fn test_frame(width: u32, height: u32) -> DecodedFrame {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push(((x + y) % 256) as u8);
            data.push(((x * 2) % 256) as u8);
            data.push(((y * 2) % 256) as u8);
        }
    }
    DecodedFrame {
        frame_number: 0,
        width,
        height,
        data,
    }
}

/// Benchmark single-frame preprocessing at typical source resolutions
fn bench_preprocess_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocess_frame");

    let resolutions = vec![(320, 240, "320x240"), (1280, 720, "1280x720"), (1920, 1080, "1920x1080")];

    for (width, height, name) in resolutions {
        let frame = test_frame(width, height);

        group.bench_with_input(BenchmarkId::new("normalize", name), &frame, |b, frame| {
            b.iter(|| {
                let tensor = preprocess_frame(black_box(frame)).unwrap();
                black_box(tensor);
            });
        });
    }

    group.finish();
}

/// Benchmark the full 16-frame set: parallel preprocess plus batch assembly
fn bench_clip_front_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("clip_front_end");
    group.sample_size(20);

    let frames: Vec<DecodedFrame> = (0..NUM_FRAMES as u64)
        .map(|_| test_frame(1280, 720))
        .collect();

    group.bench_function("preprocess_16_frames", |b| {
        b.iter(|| {
            let tensors = preprocess_frames(black_box(&frames)).unwrap();
            black_box(tensors);
        });
    });

    let tensors = preprocess_frames(&frames).unwrap();
    group.bench_function("assemble_batch", |b| {
        b.iter(|| {
            let batch = assemble(black_box(&tensors)).unwrap();
            black_box(batch);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_preprocess_frame, bench_clip_front_end);
criterion_main!(benches);
