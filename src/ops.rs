//! Elementwise primitives: softmax, RMS statistics, dot product
//!
//! Every operation has a portable scalar implementation that defines the
//! accumulation semantics, plus an AVX2 path selected at runtime that keeps
//! the same sum-of-elementwise-products structure (intermediate grouping may
//! differ, so results agree only up to float accumulation order). Scalar
//! variants are `pub(crate)` so the test suite can compare both paths on the
//! same host.
//!
//! [`rmsnorm`] is thread-partition-aware: it writes only its own contiguous
//! slice of the output, so `thread_count` callers with distinct indices can
//! run concurrently against one output buffer without synchronization.

/// Numerical stability term added to the mean square before the square root
const RMS_EPS: f32 = 1e-5;

// ============================================================================
// Dot product
// ============================================================================

/// Scalar inner product of two equal-length f32 vectors
///
/// Length must be a multiple of 4 (the minimum vector lane width); violating
/// this is a programming fault, not a recoverable error.
///
/// # Panics
///
/// Panics if the lengths differ or are not a multiple of 4.
#[must_use]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "dot_product requires equal lengths");
    assert!(
        a.len().is_multiple_of(4),
        "dot_product length {} is not a multiple of 4",
        a.len()
    );
    dot_f32(a, b)
}

/// Inner product with runtime SIMD dispatch, no alignment preconditions
#[inline]
pub(crate) fn dot_f32(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") && a.len() >= 8 {
            // SAFETY: AVX2+FMA verified at runtime
            return unsafe { dot_f32_avx2(a, b) };
        }
    }
    dot_f32_scalar(a, b)
}

/// Scalar reference: plain sum of elementwise products
#[inline]
pub(crate) fn dot_f32_scalar(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        sum += x * y;
    }
    sum
}

/// AVX2 inner product: 8-wide FMA accumulation with a scalar tail
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn dot_f32_avx2(a: &[f32], b: &[f32]) -> f32 {
    // SAFETY: caller verified AVX2+FMA; all loads stay within the slices
    unsafe {
        use std::arch::x86_64::{
            _mm256_castps256_ps128, _mm256_extractf128_ps, _mm256_fmadd_ps, _mm256_loadu_ps,
            _mm256_setzero_ps, _mm_add_ps, _mm_cvtss_f32, _mm_hadd_ps,
        };

        let len = a.len().min(b.len());
        let chunks = len / 8;

        let mut acc = _mm256_setzero_ps();
        for i in 0..chunks {
            let va = _mm256_loadu_ps(a.as_ptr().add(i * 8));
            let vb = _mm256_loadu_ps(b.as_ptr().add(i * 8));
            acc = _mm256_fmadd_ps(va, vb, acc);
        }

        // Horizontal sum of the 8 lanes
        let sum128 = _mm_add_ps(_mm256_castps256_ps128(acc), _mm256_extractf128_ps(acc, 1));
        let sum64 = _mm_hadd_ps(sum128, sum128);
        let sum32 = _mm_hadd_ps(sum64, sum64);
        let mut sum = _mm_cvtss_f32(sum32);

        for i in (chunks * 8)..len {
            sum += a[i] * b[i];
        }
        sum
    }
}

// ============================================================================
// Softmax
// ============================================================================

/// In-place numerically stabilized softmax
///
/// Subtracts the maximum before exponentiating so large logits cannot
/// overflow, then normalizes by the sum of exponentials. Behavior for an
/// empty slice is undefined (there is no maximum element); callers must
/// reject that case.
pub fn softmax(x: &mut [f32]) {
    debug_assert!(!x.is_empty(), "softmax on empty slice");

    let max_val = max_f32(x);

    // exp and sum stay scalar: accuracy of exp dominates here
    let mut sum = 0.0f32;
    for v in x.iter_mut() {
        *v = (*v - max_val).exp();
        sum += *v;
    }

    scale_f32(x, 1.0 / sum);
}

/// Maximum element with runtime SIMD dispatch
#[inline]
fn max_f32(x: &[f32]) -> f32 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && x.len() >= 8 {
            // SAFETY: AVX2 verified at runtime
            return unsafe { max_f32_avx2(x) };
        }
    }
    max_f32_scalar(x)
}

#[inline]
pub(crate) fn max_f32_scalar(x: &[f32]) -> f32 {
    x.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}

/// AVX2 max reduction with a scalar tail
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn max_f32_avx2(x: &[f32]) -> f32 {
    // SAFETY: caller verified AVX2; all loads stay within the slice
    unsafe {
        use std::arch::x86_64::{
            _mm256_castps256_ps128, _mm256_extractf128_ps, _mm256_loadu_ps, _mm256_max_ps,
            _mm256_set1_ps, _mm_cvtss_f32, _mm_max_ps, _mm_max_ss, _mm_movehl_ps, _mm_shuffle_ps,
        };

        let chunks = x.len() / 8;
        let mut max_vec = _mm256_set1_ps(f32::NEG_INFINITY);
        for i in 0..chunks {
            let v = _mm256_loadu_ps(x.as_ptr().add(i * 8));
            max_vec = _mm256_max_ps(max_vec, v);
        }

        let max128 = _mm_max_ps(
            _mm256_castps256_ps128(max_vec),
            _mm256_extractf128_ps(max_vec, 1),
        );
        let max64 = _mm_max_ps(max128, _mm_movehl_ps(max128, max128));
        let max32 = _mm_max_ss(max64, _mm_shuffle_ps(max64, max64, 1));
        let mut max_val = _mm_cvtss_f32(max32);

        for &v in &x[chunks * 8..] {
            max_val = max_val.max(v);
        }
        max_val
    }
}

/// Multiply every element by `factor`, SIMD where available
#[inline]
fn scale_f32(x: &mut [f32], factor: f32) {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && x.len() >= 8 {
            // SAFETY: AVX2 verified at runtime
            unsafe { scale_f32_avx2(x, factor) };
            return;
        }
    }
    for v in x.iter_mut() {
        *v *= factor;
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn scale_f32_avx2(x: &mut [f32], factor: f32) {
    // SAFETY: caller verified AVX2; all loads/stores stay within the slice
    unsafe {
        use std::arch::x86_64::{_mm256_loadu_ps, _mm256_mul_ps, _mm256_set1_ps, _mm256_storeu_ps};

        let chunks = x.len() / 8;
        let vf = _mm256_set1_ps(factor);
        for i in 0..chunks {
            let v = _mm256_loadu_ps(x.as_ptr().add(i * 8));
            _mm256_storeu_ps(x.as_mut_ptr().add(i * 8), _mm256_mul_ps(v, vf));
        }
        for v in &mut x[chunks * 8..] {
            *v *= factor;
        }
    }
}

// ============================================================================
// RMS normalization
// ============================================================================

/// Inverse root-mean-square of a vector: `1 / sqrt(mean(x^2) + 1e-5)`
///
/// The epsilon guards against division by near-zero for all-zero inputs.
/// Length must be a multiple of 4.
///
/// # Panics
///
/// Panics if the length is not a multiple of 4.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms_inv(x: &[f32]) -> f32 {
    assert!(
        x.len().is_multiple_of(4),
        "rms_inv length {} is not a multiple of 4",
        x.len()
    );

    let sum_sq = dot_f32(x, x);
    let mean_sq = sum_sq / x.len() as f32;
    1.0 / (mean_sq + RMS_EPS).sqrt()
}

/// Thread-sliced RMS normalize-and-scale
///
/// Computes `output[j] = weight[j] * (scale * x[j])` over this thread's
/// contiguous slice of the buffers. Slices are the simple equal division
/// `len / thread_count` wide, so the length must divide evenly; remainder-
/// aware splitting is only used for matmul rows where per-row cost is high.
///
/// Safe to call concurrently from `thread_count` callers with distinct
/// indices: each writes a disjoint output slice.
///
/// # Panics
///
/// Panics if buffer lengths differ, the length is not a multiple of 4, or the
/// length is not divisible by `thread_count`.
pub fn rmsnorm(
    output: &mut [f32],
    x: &[f32],
    scale: f32,
    weight: &[f32],
    thread_count: usize,
    thread_index: usize,
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
    assert!(thread_index < thread_count, "thread index out of range");

    let slice = x.len() / thread_count;
    let start = thread_index * slice;
    let end = start + slice;
    rmsnorm_slice(
        &mut output[start..end],
        &x[start..end],
        scale,
        &weight[start..end],
    );
}

/// Normalize one slice; used by both the indexed and the rayon entry points
#[inline]
pub(crate) fn rmsnorm_slice(output: &mut [f32], x: &[f32], scale: f32, weight: &[f32]) {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && x.len() >= 8 {
            // SAFETY: AVX2 verified at runtime
            unsafe { rmsnorm_slice_avx2(output, x, scale, weight) };
            return;
        }
    }
    rmsnorm_slice_scalar(output, x, scale, weight);
}

#[inline]
pub(crate) fn rmsnorm_slice_scalar(output: &mut [f32], x: &[f32], scale: f32, weight: &[f32]) {
    for ((o, &xv), &wv) in output.iter_mut().zip(x.iter()).zip(weight.iter()) {
        *o = wv * (scale * xv);
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn rmsnorm_slice_avx2(output: &mut [f32], x: &[f32], scale: f32, weight: &[f32]) {
    // SAFETY: caller verified AVX2; slice lengths are equal by the callers'
    // asserts, all loads/stores stay in bounds
    unsafe {
        use std::arch::x86_64::{
            _mm256_loadu_ps, _mm256_mul_ps, _mm256_set1_ps, _mm256_storeu_ps,
        };

        let len = x.len();
        let chunks = len / 8;
        let vs = _mm256_set1_ps(scale);
        for i in 0..chunks {
            let vx = _mm256_loadu_ps(x.as_ptr().add(i * 8));
            let vw = _mm256_loadu_ps(weight.as_ptr().add(i * 8));
            let scaled = _mm256_mul_ps(vx, vs);
            _mm256_storeu_ps(output.as_mut_ptr().add(i * 8), _mm256_mul_ps(vw, scaled));
        }
        for j in (chunks * 8)..len {
            output[j] = weight[j] * (scale * x[j]);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
