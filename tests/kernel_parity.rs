//! Parity tests against a plain nested-loop reference
//!
//! Every kernel variant is checked against the same naive f32 reference
//! matmul, with tolerances scaled to the precision of the weight format.

use calcular::quantize::{dequantize_q4_0, quantize_q4_0, quantize_q8_0};
use calcular::{dot_product, matmul, matmul_parallel, thread_row_range, TensorView};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Naive row-major matvec: the correctness reference for everything else
fn reference_matmul(weights: &[f32], input: &[f32], n: usize, d: usize) -> Vec<f32> {
    let mut output = vec![0.0f32; d];
    for (row, slot) in output.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for col in 0..n {
            acc += weights[row * n + col] * input[col];
        }
        *slot = acc;
    }
    output
}

fn random_vector(rng: &mut StdRng, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

#[test]
fn f32_matmul_thread_slices_match_reference() {
    // n=256, d=4, two threads: each thread's subrange must match the
    // reference within 1e-4
    let mut rng = StdRng::seed_from_u64(42);
    let n = 256;
    let d = 4;
    let weights = random_vector(&mut rng, n * d);
    let input = random_vector(&mut rng, n);
    let expected = reference_matmul(&weights, &input, n, d);

    let mut output = vec![0.0f32; d];
    for thread_index in 0..2 {
        matmul(
            &mut output,
            TensorView::F32(&input),
            TensorView::F32(&weights),
            n,
            d,
            2,
            thread_index,
        )
        .unwrap();

        // Rows computed so far match; later rows still untouched (zero)
        let done = thread_row_range(thread_index, 2, d).end;
        for row in 0..done {
            assert!(
                (output[row] - expected[row]).abs() < 1e-4,
                "row {row}: {} vs {}",
                output[row],
                expected[row]
            );
        }
    }
}

#[test]
fn f32_matmul_self_row_is_self_dot() {
    // A 1 x n weight matrix equal to the input itself yields the
    // self inner product
    let mut rng = StdRng::seed_from_u64(7);
    let n = 128;
    let input = random_vector(&mut rng, n);

    let mut output = vec![0.0f32; 1];
    matmul(
        &mut output,
        TensorView::F32(&input),
        TensorView::F32(&input),
        n,
        1,
        1,
        0,
    )
    .unwrap();

    let expected = dot_product(&input, &input);
    assert!((output[0] - expected).abs() < expected.abs() * 1e-5 + 1e-5);
}

#[test]
fn f16_matmul_matches_reference_at_half_precision() {
    let mut rng = StdRng::seed_from_u64(11);
    let n = 64;
    let d = 9;
    let weights = random_vector(&mut rng, n * d);
    let input = random_vector(&mut rng, n);

    // Round the reference weights through f16 so the comparison isolates
    // kernel error from representation error
    let rounded: Vec<f32> = weights
        .iter()
        .map(|&w| half::f16::from_f32(w).to_f32())
        .collect();
    let expected = reference_matmul(&rounded, &input, n, d);

    let w16: Vec<u8> = weights
        .iter()
        .flat_map(|&w| half::f16::from_f32(w).to_le_bytes())
        .collect();
    let mut output = vec![0.0f32; d];
    matmul(
        &mut output,
        TensorView::F32(&input),
        TensorView::F16(&w16),
        n,
        d,
        1,
        0,
    )
    .unwrap();

    for (got, want) in output.iter().zip(expected.iter()) {
        assert!((got - want).abs() < 1e-4, "{got} vs {want}");
    }
}

#[test]
fn q4_0_matmul_matches_dequantized_reference() {
    let mut rng = StdRng::seed_from_u64(23);
    let n = 512;
    let d = 6;
    let weights = random_vector(&mut rng, n * d);
    let input = random_vector(&mut rng, n);
    let q4 = quantize_q4_0(&weights).unwrap();

    // The fused kernel must agree with dequantize-then-multiply, not with
    // the unquantized weights: quantization error is the format's business,
    // kernel error is ours
    let restored = dequantize_q4_0(&q4).unwrap();
    let expected = reference_matmul(&restored, &input, n, d);

    let mut output = vec![0.0f32; d];
    matmul(
        &mut output,
        TensorView::F32(&input),
        TensorView::Q4_0(&q4),
        n,
        d,
        1,
        0,
    )
    .unwrap();

    for (got, want) in output.iter().zip(expected.iter()) {
        assert!((got - want).abs() < 1e-3, "{got} vs {want}");
    }
}

#[test]
fn q4_0_q8_0_matmul_tracks_f32_reference() {
    let mut rng = StdRng::seed_from_u64(31);
    let n = 256;
    let d = 8;
    let weights = random_vector(&mut rng, n * d);
    let input = random_vector(&mut rng, n);
    let q4 = quantize_q4_0(&weights).unwrap();
    let q8 = quantize_q8_0(&input).unwrap();

    let expected = reference_matmul(&weights, &input, n, d);

    let mut output = vec![0.0f32; d];
    matmul(
        &mut output,
        TensorView::Q8_0(&q8),
        TensorView::Q4_0(&q4),
        n,
        d,
        1,
        0,
    )
    .unwrap();

    // Both sides quantized: tolerance is dominated by the 4-bit weights,
    // whose per-element error accumulates over n=256 terms
    for (got, want) in output.iter().zip(expected.iter()) {
        assert!(
            (got - want).abs() < want.abs() * 0.1 + 1.5,
            "{got} vs {want}"
        );
    }
}

#[test]
fn all_thread_counts_produce_identical_output() {
    let mut rng = StdRng::seed_from_u64(47);
    let n = 256;
    let d = 13;
    let weights = random_vector(&mut rng, n * d);
    let input = random_vector(&mut rng, n);

    let mut baseline = vec![0.0f32; d];
    matmul(
        &mut baseline,
        TensorView::F32(&input),
        TensorView::F32(&weights),
        n,
        d,
        1,
        0,
    )
    .unwrap();

    for thread_count in [2usize, 3, 5, 13] {
        let mut output = vec![f32::NAN; d];
        for thread_index in 0..thread_count {
            matmul(
                &mut output,
                TensorView::F32(&input),
                TensorView::F32(&weights),
                n,
                d,
                thread_count,
                thread_index,
            )
            .unwrap();
        }
        // Partitioning must not change results at all: every row is computed
        // by exactly one thread, by the same kernel
        assert_eq!(baseline, output, "thread_count {thread_count}");
    }
}

#[test]
fn parallel_fan_out_matches_indexed_invocations() {
    let mut rng = StdRng::seed_from_u64(59);
    let n = 512;
    let d = 21;
    let weights = random_vector(&mut rng, n * d);
    let input = random_vector(&mut rng, n);
    let q4 = quantize_q4_0(&weights).unwrap();

    let mut indexed = vec![0.0f32; d];
    for thread_index in 0..4 {
        matmul(
            &mut indexed,
            TensorView::F32(&input),
            TensorView::Q4_0(&q4),
            n,
            d,
            4,
            thread_index,
        )
        .unwrap();
    }

    let mut parallel = vec![0.0f32; d];
    matmul_parallel(
        &mut parallel,
        TensorView::F32(&input),
        TensorView::Q4_0(&q4),
        n,
        d,
        4,
    )
    .unwrap();

    assert_eq!(indexed, parallel);
}
