use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{imageops::FilterType, DynamicImage, Rgba, RgbaImage};
use smartcut::{
    Compositor, ImagePreprocessor, MaskExtractor, MaskNormalizer, NormalizationOptions, Tensor,
};

const MODEL_SIZE: usize = 320;

/// Radial confidence falloff, roughly what a centered subject produces
fn radial_output(shape: &[usize]) -> Tensor {
    let len: usize = shape.iter().product();
    let center = MODEL_SIZE as f32 / 2.0;
    let values = (0..len)
        .map(|i| {
            let pixel = i % (MODEL_SIZE * MODEL_SIZE);
            let (y, x) = ((pixel / MODEL_SIZE) as f32, (pixel % MODEL_SIZE) as f32);
            let distance = ((x - center).powi(2) + (y - center).powi(2)).sqrt();
            (1.0 - distance / center).max(0.0)
        })
        .collect();
    Tensor::from_shape_vec(shape, values).unwrap()
}

fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("mask_extraction");
    let layouts: [(&str, Vec<usize>); 4] = [
        ("channel_first", vec![1, 1, MODEL_SIZE, MODEL_SIZE]),
        ("channel_last", vec![1, MODEL_SIZE, MODEL_SIZE, 1]),
        ("side_outputs", vec![1, 7, MODEL_SIZE, MODEL_SIZE]),
        ("flattened", vec![1, MODEL_SIZE * MODEL_SIZE]),
    ];

    for (name, shape) in layouts {
        let tensor = radial_output(&shape);
        group.bench_with_input(BenchmarkId::from_parameter(name), &tensor, |b, tensor| {
            b.iter(|| {
                MaskExtractor::extract_tensor(black_box(tensor), MODEL_SIZE, MODEL_SIZE).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_normalization(c: &mut Criterion) {
    let map = MaskExtractor::extract_tensor(
        &radial_output(&[1, 1, MODEL_SIZE, MODEL_SIZE]),
        MODEL_SIZE,
        MODEL_SIZE,
    )
    .unwrap();

    let mut group = c.benchmark_group("normalization");
    for apply_sigmoid in [false, true] {
        let options = NormalizationOptions {
            apply_sigmoid,
            ..NormalizationOptions::default()
        };
        group.bench_with_input(
            BenchmarkId::new("sigmoid", apply_sigmoid),
            &options,
            |b, &options| b.iter(|| MaskNormalizer::normalize(black_box(&map), options).unwrap()),
        );
    }
    group.finish();
}

fn bench_compositing(c: &mut Criterion) {
    let map = MaskExtractor::extract_tensor(
        &radial_output(&[1, 1, MODEL_SIZE, MODEL_SIZE]),
        MODEL_SIZE,
        MODEL_SIZE,
    )
    .unwrap();
    let mask = MaskNormalizer::normalize(&map, NormalizationOptions::default()).unwrap();

    let mut group = c.benchmark_group("compositing");
    group.sample_size(20);
    for (width, height) in [(640, 480), (1920, 1080)] {
        let original = RgbaImage::from_pixel(width, height, Rgba([120, 80, 40, 255]));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", width, height)),
            &original,
            |b, original| {
                b.iter(|| {
                    Compositor::composite(original.clone(), black_box(&mask), FilterType::CatmullRom)
                        .unwrap()
                });
            },
        );
    }
    group.finish();
}

fn bench_preprocessing(c: &mut Criterion) {
    let photo = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1920, 1080, Rgba([90, 160, 220, 255])));
    let target = (MODEL_SIZE as u32, MODEL_SIZE as u32);

    let mut group = c.benchmark_group("preprocessing");
    group.sample_size(20);
    group.bench_function("1920x1080_to_320", |b| {
        b.iter(|| {
            ImagePreprocessor::prepare(black_box(&photo), target, FilterType::CatmullRom).unwrap()
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_extraction,
    bench_normalization,
    bench_compositing,
    bench_preprocessing
);
criterion_main!(benches);
