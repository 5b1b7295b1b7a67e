//! Thread-sliced matrix-vector multiplication
//!
//! ```text
//!     weights      input    output
//!   ___________     ___      ___
//!   |         |     | |      | |
//! d |         | *   | |  = d | |
//!   |_________|   n | |      |_|
//!        n          |_|       1
//!                    1
//! ```
//!
//! [`matmul`] computes one thread's contiguous range of output rows and
//! dispatches on the (weights, input) format pairing. The partition is a pure
//! function of `(thread_index, thread_count, d)`: ranges are disjoint and
//! cover `[0, d)` exactly, so `thread_count` concurrent callers with distinct
//! indices can share one output buffer without locking. The kernels contain
//! no synchronization primitives, never block, and allocate nothing beyond
//! small fixed-size stack scratch buffers.

pub(crate) mod fused;

use std::ops::Range;

use crate::error::{KernelError, Result};
use crate::ops::dot_f32;
use crate::quantize::BLOCK_SIZE;
use crate::tensor::TensorView;
use self::fused::{dot_f16_row, fused_q4_0_dot, fused_q4_0_q8_0_dot, GROUP_SIZE};

/// Contiguous output-row range owned by one thread
///
/// `floor(t * d / threads) .. floor((t + 1) * d / threads)` rather than a
/// fixed `d / threads` slice: when `d` does not divide evenly, the remainder
/// rows spread across the threads instead of being dropped or overflowing the
/// last range. For a fixed `thread_count`, the ranges over all indices
/// partition `[0, d)`.
///
/// # Panics
///
/// Panics if `thread_count` is zero or `thread_index` is out of range.
#[must_use]
pub fn thread_row_range(thread_index: usize, thread_count: usize, d: usize) -> Range<usize> {
    assert!(thread_count > 0, "thread_count must be non-zero");
    assert!(
        thread_index < thread_count,
        "thread index {thread_index} out of range for {thread_count} threads"
    );
    (thread_index * d / thread_count)..((thread_index + 1) * d / thread_count)
}

/// Thread-sliced matrix-vector multiply with format dispatch
///
/// Computes `output[r] = dot(weights[r, ..], input)` for every row `r` in
/// this thread's range, leaving the rest of `output` untouched.
///
/// Supported pairings (weights x input): `F32 x F32`, `F16 x F32`,
/// `Q4_0 x F32`, `Q4_0 x Q8_0`. Any other pairing has no defined kernel and
/// returns [`KernelError::UnsupportedFormats`]; this is a configuration bug
/// to catch before the hot loop, not a per-call contingency.
///
/// # Arguments
///
/// * `output` - Output buffer of length `d`; only this thread's row range is
///   written
/// * `input` - Input vector of `n` elements in its declared format
/// * `weights` - Row-major `d` x `n` weight matrix in its declared format
/// * `n` - Shared inner dimension
/// * `d` - Output dimension
/// * `thread_count` / `thread_index` - Partition coordinates; every
///   concurrent caller must use the same count and a distinct index
///
/// # Errors
///
/// Returns [`KernelError::UnsupportedFormats`] for an unlisted pairing and
/// [`KernelError::InvalidShape`] when a buffer is too small for `n` x `d`.
///
/// # Panics
///
/// Panics on block-divisibility violations (`n` not a multiple of 32 for
/// quantized weights, of 256 for the `Q4_0` x f32 group path) and on invalid
/// partition coordinates.
pub fn matmul(
    output: &mut [f32],
    input: TensorView<'_>,
    weights: TensorView<'_>,
    n: usize,
    d: usize,
    thread_count: usize,
    thread_index: usize,
) -> Result<()> {
    if output.len() != d {
        return Err(KernelError::InvalidShape {
            reason: format!("output length {} doesn't match d {}", output.len(), d),
        });
    }

    let rows = thread_row_range(thread_index, thread_count, d);
    let out = &mut output[rows.clone()];
    matmul_rows(out, input, weights, n, rows)
}

/// Compute `out[i] = dot(weights[rows.start + i, ..], input)`
///
/// Shared by [`matmul`] and the rayon fan-out: `out` is exactly the
/// sub-buffer for `rows`, so disjoint ranges borrow disjoint slices.
pub(crate) fn matmul_rows(
    out: &mut [f32],
    input: TensorView<'_>,
    weights: TensorView<'_>,
    n: usize,
    rows: Range<usize>,
) -> Result<()> {
    debug_assert_eq!(out.len(), rows.len());

    match (weights, input) {
        (TensorView::F32(w), TensorView::F32(x)) => {
            validate_input_len(x.len(), n)?;
            validate_weight_len(w.len() * 4, weights.dtype().row_bytes(n), rows.end, "F32")?;
            for (i, slot) in out.iter_mut().enumerate() {
                let row = &w[(rows.start + i) * n..(rows.start + i + 1) * n];
                *slot = dot_f32(row, x);
            }
            Ok(())
        }
        (TensorView::F16(w), TensorView::F32(x)) => {
            validate_input_len(x.len(), n)?;
            validate_weight_len(w.len(), weights.dtype().row_bytes(n), rows.end, "F16")?;
            let row_bytes = n * 2;
            for (i, slot) in out.iter_mut().enumerate() {
                let row = &w[(rows.start + i) * row_bytes..(rows.start + i + 1) * row_bytes];
                *slot = dot_f16_row(row, x);
            }
            Ok(())
        }
        (TensorView::Q4_0(w), TensorView::F32(x)) => {
            assert!(
                n.is_multiple_of(GROUP_SIZE),
                "Q4_0 x F32 requires n divisible by {GROUP_SIZE}, got {n}"
            );
            validate_input_len(x.len(), n)?;
            let row_bytes = weights.dtype().row_bytes(n);
            validate_weight_len(w.len(), row_bytes, rows.end, "Q4_0")?;
            for (i, slot) in out.iter_mut().enumerate() {
                let row = &w[(rows.start + i) * row_bytes..(rows.start + i + 1) * row_bytes];
                *slot = fused_q4_0_dot(row, x);
            }
            Ok(())
        }
        (TensorView::Q4_0(w), TensorView::Q8_0(xq)) => {
            assert!(
                n.is_multiple_of(BLOCK_SIZE),
                "Q4_0 x Q8_0 requires n divisible by {BLOCK_SIZE}, got {n}"
            );
            let input_bytes = input.dtype().row_bytes(n);
            if xq.len() < input_bytes {
                return Err(KernelError::InvalidShape {
                    reason: format!(
                        "Q8_0 input too small: need {} bytes for n {}, have {}",
                        input_bytes,
                        n,
                        xq.len()
                    ),
                });
            }
            let row_bytes = weights.dtype().row_bytes(n);
            validate_weight_len(w.len(), row_bytes, rows.end, "Q4_0")?;
            for (i, slot) in out.iter_mut().enumerate() {
                let row = &w[(rows.start + i) * row_bytes..(rows.start + i + 1) * row_bytes];
                *slot = fused_q4_0_q8_0_dot(row, xq, n);
            }
            Ok(())
        }
        (w, x) => Err(KernelError::UnsupportedFormats {
            weights: w.dtype(),
            input: x.dtype(),
        }),
    }
}

fn validate_input_len(got: usize, n: usize) -> Result<()> {
    if got != n {
        return Err(KernelError::InvalidShape {
            reason: format!("input length {got} doesn't match n {n}"),
        });
    }
    Ok(())
}

fn validate_weight_len(got_bytes: usize, row_bytes: usize, rows_end: usize, fmt: &str) -> Result<()> {
    let needed = rows_end * row_bytes;
    if got_bytes < needed {
        return Err(KernelError::InvalidShape {
            reason: format!(
                "{fmt} weight data too small: need {needed} bytes for {rows_end} rows, have {got_bytes}"
            ),
        });
    }
    Ok(())
}
