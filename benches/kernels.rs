//! Benchmark suite for the matmul kernels and elementwise primitives
//!
//! Measures per-call latency of each format pairing at transformer-ish
//! dimensions, plus the surrounding primitives.

use calcular::quantize::{quantize_q4_0, quantize_q8_0};
use calcular::{dot_product, matmul, matmul_parallel, rms_inv, softmax, TensorView};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn test_data(len: usize, seed: f32) -> Vec<f32> {
    (0..len).map(|i| ((i as f32) * 0.618 + seed).sin()).collect()
}

fn bench_matmul_formats(c: &mut Criterion) {
    let n = 1024;
    let d = 1024;
    let weights = test_data(n * d, 0.0);
    let input = test_data(n, 1.0);
    let w16: Vec<u8> = weights
        .iter()
        .flat_map(|&w| half::f16::from_f32(w).to_le_bytes())
        .collect();
    let q4 = quantize_q4_0(&weights).unwrap();
    let q8 = quantize_q8_0(&input).unwrap();
    let mut output = vec![0.0f32; d];

    let mut group = c.benchmark_group("matmul_1024x1024");

    group.bench_function("f32_f32", |b| {
        b.iter(|| {
            matmul(
                black_box(&mut output),
                TensorView::F32(&input),
                TensorView::F32(&weights),
                n,
                d,
                1,
                0,
            )
            .unwrap();
        });
    });

    group.bench_function("f16_f32", |b| {
        b.iter(|| {
            matmul(
                black_box(&mut output),
                TensorView::F32(&input),
                TensorView::F16(&w16),
                n,
                d,
                1,
                0,
            )
            .unwrap();
        });
    });

    group.bench_function("q4_0_f32", |b| {
        b.iter(|| {
            matmul(
                black_box(&mut output),
                TensorView::F32(&input),
                TensorView::Q4_0(&q4),
                n,
                d,
                1,
                0,
            )
            .unwrap();
        });
    });

    group.bench_function("q4_0_q8_0", |b| {
        b.iter(|| {
            matmul(
                black_box(&mut output),
                TensorView::Q8_0(&q8),
                TensorView::Q4_0(&q4),
                n,
                d,
                1,
                0,
            )
            .unwrap();
        });
    });

    group.finish();
}

fn bench_matmul_parallel(c: &mut Criterion) {
    let n = 1024;
    let d = 4096;
    let weights = test_data(n * d, 0.0);
    let q4 = quantize_q4_0(&weights).unwrap();
    let input = test_data(n, 1.0);
    let mut output = vec![0.0f32; d];

    let mut group = c.benchmark_group("matmul_parallel_q4_0");
    for threads in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &t| {
            b.iter(|| {
                matmul_parallel(
                    black_box(&mut output),
                    TensorView::F32(&input),
                    TensorView::Q4_0(&q4),
                    n,
                    d,
                    t,
                )
                .unwrap();
            });
        });
    }
    group.finish();
}

fn bench_primitives(c: &mut Criterion) {
    let x = test_data(4096, 2.0);
    let y = test_data(4096, 3.0);

    c.bench_function("dot_product_4096", |b| {
        b.iter(|| black_box(dot_product(black_box(&x), black_box(&y))));
    });

    c.bench_function("rms_inv_4096", |b| {
        b.iter(|| black_box(rms_inv(black_box(&x))));
    });

    c.bench_function("softmax_4096", |b| {
        let mut buf = x.clone();
        b.iter(|| {
            buf.copy_from_slice(&x);
            softmax(black_box(&mut buf));
        });
    });

    c.bench_function("quantize_q8_0_4096", |b| {
        b.iter(|| black_box(quantize_q8_0(black_box(&x)).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_matmul_formats,
    bench_matmul_parallel,
    bench_primitives
);
criterion_main!(benches);
