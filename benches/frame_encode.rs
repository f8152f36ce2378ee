use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use food_scanner::capture::{encode_jpeg, CapturedFrame};
use image::{Rgb, RgbImage};

fn test_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
    })
}

fn bench_encode(c: &mut Criterion) {
    let image = test_frame(1280, 720);
    let mut group = c.benchmark_group("encode_jpeg_720p");
    for quality in [50u8, 80, 95] {
        group.bench_with_input(BenchmarkId::from_parameter(quality), &quality, |b, &q| {
            b.iter(|| encode_jpeg(black_box(&image), q))
        });
    }
    group.finish();
}

fn bench_base64(c: &mut Criterion) {
    let bytes = encode_jpeg(&test_frame(1280, 720), 80).expect("encode");
    let frame = CapturedFrame::new(bytes, 1280, 720, 1);
    c.bench_function("frame_to_base64_720p", |b| b.iter(|| black_box(&frame).to_base64()));
}

criterion_group!(benches, bench_encode, bench_base64);
criterion_main!(benches);
