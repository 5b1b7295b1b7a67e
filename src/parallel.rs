//! Rayon fan-out over the thread partition
//!
//! The kernels themselves are pure functions of `(thread_count,
//! thread_index)` and contain no concurrency primitives; this module supplies
//! the actual parallel execution for callers that don't bring their own
//! worker threads. The output buffer is split into the exact partition slices
//! up front, so each rayon task owns a disjoint `&mut` region and no
//! synchronization is needed.
//!
//! External schedulers (a caller-managed thread pool, one invocation per
//! worker) should call [`crate::matmul`] / [`crate::ops::rmsnorm`] directly
//! with their own indices instead.

use rayon::prelude::*;

use crate::error::{KernelError, Result};
use crate::kernels::{matmul_rows, thread_row_range};
use crate::ops::rmsnorm_slice;
use crate::tensor::TensorView;

/// Matrix-vector multiply fanned out across `thread_count` rayon tasks
///
/// Equivalent to invoking [`crate::matmul`] once per `thread_index` from
/// `thread_count` concurrent workers; results are identical because each row
/// is computed by exactly one task.
///
/// # Errors
///
/// Same contract as [`crate::matmul`].
///
/// # Panics
///
/// Panics if `thread_count` is zero or on block-divisibility violations.
pub fn matmul_parallel(
    output: &mut [f32],
    input: TensorView<'_>,
    weights: TensorView<'_>,
    n: usize,
    d: usize,
    thread_count: usize,
) -> Result<()> {
    assert!(thread_count > 0, "thread_count must be non-zero");
    if output.len() != d {
        return Err(KernelError::InvalidShape {
            reason: format!("output length {} doesn't match d {}", output.len(), d),
        });
    }

    if thread_count == 1 {
        return matmul_rows(output, input, weights, n, 0..d);
    }

    // Carve the output into the partition's disjoint slices before spawning
    let mut slices = Vec::with_capacity(thread_count);
    let mut rest = output;
    let mut consumed = 0;
    for thread_index in 0..thread_count {
        let rows = thread_row_range(thread_index, thread_count, d);
        let (head, tail) = rest.split_at_mut(rows.end - consumed);
        consumed = rows.end;
        slices.push((rows, head));
        rest = tail;
    }

    slices
        .into_par_iter()
        .try_for_each(|(rows, out)| matmul_rows(out, input, weights, n, rows))
}

/// RMS normalize-and-scale fanned out across `thread_count` rayon tasks
///
/// Equivalent to invoking [`crate::ops::rmsnorm`] once per thread index.
///
/// # Panics
///
/// Same contract as [`crate::ops::rmsnorm`]: lengths must match, be a
/// multiple of 4, and divide evenly by `thread_count`.
pub fn rmsnorm_parallel(
    output: &mut [f32],
    x: &[f32],
    scale: f32,
    weight: &[f32],
    thread_count: usize,
) {
    assert_eq!(output.len(), x.len(), "rmsnorm output/input length mismatch");
    assert_eq!(weight.len(), x.len(), "rmsnorm weight/input length mismatch");
    assert!(
        x.len().is_multiple_of(4),
        "rmsnorm length {} is not a multiple of 4",
        x.len()
    );
    assert!(
        thread_count > 0 && x.len().is_multiple_of(thread_count),
        "rmsnorm length {} is not divisible by thread count {}",
        x.len(),
        thread_count
    );
    if x.is_empty() {
        return;
    }

    let slice = x.len() / thread_count;
    output
        .par_chunks_mut(slice)
        .zip(x.par_chunks(slice))
        .zip(weight.par_chunks(slice))
        .for_each(|((out, xs), ws)| rmsnorm_slice(out, xs, scale, ws));
}
