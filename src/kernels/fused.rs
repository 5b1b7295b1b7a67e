//! Fused row dot-product kernels, one per supported format pairing
//!
//! Each kernel computes the inner product of one weight row (in its wire
//! format) against the input vector, fusing dequantization into the dot
//! product so quantized weights never materialize as a full f32 row:
//! - [`dot_f16_row`] - f16 weights converted on the fly via the LUT
//! - [`fused_q4_0_dot`] - `Q4_0` weights dequantized one 256-element group
//!   (8 blocks) at a time into a stack scratch buffer
//! - [`fused_q4_0_q8_0_dot`] - block-paired integer dot: nibbles unpacked to
//!   signed int8, multiplied against the `Q8_0` input's int8 values, summed
//!   as integers, then scaled by the product of the two block scales
//!
//! The scalar variants define the accumulation semantics; the AVX2 variants
//! keep the same sum-of-products structure with wider intermediate grouping.

use crate::ops::{dot_f32, dot_f32_scalar};
use crate::quantize::{
    dequantize_q4_0_row, f16_to_f32_lut, BLOCK_SIZE, Q4_0_BLOCK_BYTES, Q8_0_BLOCK_BYTES,
};

/// Blocks dequantized per scratch-buffer refill in the `Q4_0` x f32 kernel
pub(crate) const GROUP_BLOCKS: usize = 8;

/// Elements per dequantization group (8 blocks of 32)
pub(crate) const GROUP_SIZE: usize = GROUP_BLOCKS * BLOCK_SIZE;

// ============================================================================
// F16 x F32
// ============================================================================

/// Dot product of an f16 weight row against an f32 input vector
///
/// Scalar with LUT conversion: the conversion table lookup dominates, so a
/// vector path buys nothing here.
#[inline]
pub(crate) fn dot_f16_row(w_row: &[u8], x: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for (pair, &xv) in w_row.chunks_exact(2).zip(x.iter()) {
        sum += f16_to_f32_lut(u16::from_le_bytes([pair[0], pair[1]])) * xv;
    }
    sum
}

// ============================================================================
// Q4_0 x F32
// ============================================================================

/// Dot product of a `Q4_0` weight row against an f32 input vector
///
/// Dequantizes one group (8 blocks, 256 elements) at a time into a local
/// scratch buffer, then inner-products against the matching input slice.
/// The scratch buffer is a per-invocation stack local, so concurrent callers
/// never share it. Row length must be a multiple of the group size.
#[inline]
pub(crate) fn fused_q4_0_dot(row_data: &[u8], x: &[f32]) -> f32 {
    fused_q4_0_dot_with(row_data, x, dot_f32)
}

/// Scalar-accumulation variant, exposed for path-parity testing
#[inline]
pub(crate) fn fused_q4_0_dot_scalar(row_data: &[u8], x: &[f32]) -> f32 {
    fused_q4_0_dot_with(row_data, x, dot_f32_scalar)
}

#[inline]
fn fused_q4_0_dot_with(row_data: &[u8], x: &[f32], dot: fn(&[f32], &[f32]) -> f32) -> f32 {
    assert!(
        x.len().is_multiple_of(GROUP_SIZE),
        "Q4_0 row width {} is not a multiple of the group size {}",
        x.len(),
        GROUP_SIZE
    );

    let mut group = [0.0f32; GROUP_SIZE];
    let mut sum = 0.0f32;
    for (g, chunk) in row_data
        .chunks_exact(GROUP_BLOCKS * Q4_0_BLOCK_BYTES)
        .enumerate()
    {
        dequantize_q4_0_row(chunk, &mut group);
        sum += dot(&group, &x[g * GROUP_SIZE..(g + 1) * GROUP_SIZE]);
    }
    sum
}

// ============================================================================
// Q4_0 x Q8_0
// ============================================================================

/// Integer dot product of a `Q4_0` weight row against a `Q8_0` input vector
///
/// Runtime dispatch: AVX2 when available, scalar otherwise. Both paths pair
/// each weight block with the input block at the same position, accumulate
/// the 32 int8 products as integers, and scale the integer sum by the product
/// of the two f16 block scales.
#[inline]
pub(crate) fn fused_q4_0_q8_0_dot(q4_row: &[u8], q8_input: &[u8], n: usize) -> f32 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            // SAFETY: AVX2+FMA verified at runtime
            return unsafe { fused_q4_0_q8_0_dot_avx2(q4_row, q8_input, n) };
        }
    }
    fused_q4_0_q8_0_dot_scalar(q4_row, q8_input, n)
}

/// Scalar reference for the integer block-paired dot product
///
/// One block at a time, any block count; the vector path must reproduce
/// these accumulation semantics.
#[allow(clippy::cast_possible_wrap, clippy::cast_precision_loss)]
pub(crate) fn fused_q4_0_q8_0_dot_scalar(q4_row: &[u8], q8_input: &[u8], n: usize) -> f32 {
    let num_blocks = n / BLOCK_SIZE;
    let mut total = 0.0f32;

    for block_idx in 0..num_blocks {
        let q4 = &q4_row[block_idx * Q4_0_BLOCK_BYTES..][..Q4_0_BLOCK_BYTES];
        let q8 = &q8_input[block_idx * Q8_0_BLOCK_BYTES..][..Q8_0_BLOCK_BYTES];

        let q4_scale = f16_to_f32_lut(u16::from_le_bytes([q4[0], q4[1]]));
        let q8_scale = f16_to_f32_lut(u16::from_le_bytes([q8[0], q8[1]]));

        let q4_quants = &q4[2..];
        let q8_quants = &q8[2..];

        let mut block_sum = 0i32;
        for (j, &byte) in q4_quants.iter().enumerate() {
            // Low nibble pairs with element j, high nibble with element j+16
            let lo = (byte & 0x0F) as i8 - 8;
            let hi = (byte >> 4) as i8 - 8;
            block_sum += i32::from(lo) * i32::from(q8_quants[j] as i8);
            block_sum += i32::from(hi) * i32::from(q8_quants[j + 16] as i8);
        }

        total += q4_scale * q8_scale * block_sum as f32;
    }

    total
}

/// AVX2 integer block-paired dot product
///
/// Processes two blocks per iteration for instruction-level parallelism, with
/// a single-block tail for odd block counts. Uses `maddubs` (u8 x i8 multiply
/// with horizontal i16 add) via the sign trick: `|w| * sign(y, w) == w * y`.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
#[allow(clippy::cast_possible_wrap)]
unsafe fn fused_q4_0_q8_0_dot_avx2(q4_row: &[u8], q8_input: &[u8], n: usize) -> f32 {
    // SAFETY: caller verified AVX2+FMA; every pointer stays within the block
    // ranges validated by the dispatcher
    unsafe {
        use std::arch::x86_64::{
            _mm256_add_ps, _mm256_and_si256, _mm256_castps256_ps128, _mm256_cvtepi32_ps,
            _mm256_extractf128_ps, _mm256_fmadd_ps, _mm256_loadu_si256, _mm256_madd_epi16,
            _mm256_maddubs_epi16, _mm256_set1_epi16, _mm256_set1_epi8, _mm256_set1_ps,
            _mm256_set_m128i, _mm256_setzero_ps, _mm256_sign_epi8, _mm256_sub_epi8, _mm_add_ps,
            _mm_cvtss_f32, _mm_hadd_ps, _mm_loadu_si128, _mm_srli_epi16,
        };

        let num_blocks = n / BLOCK_SIZE;

        let nibble_mask = _mm256_set1_epi8(0x0F);
        let bias = _mm256_set1_epi8(8);
        let ones = _mm256_set1_epi16(1);

        // One int-dot block: expand nibbles, bias, multiply against the q8
        // lane, reduce to 8 x i32, scale, accumulate
        macro_rules! block_dot {
            ($block_idx:expr, $acc:expr) => {{
                let q4_ptr = q4_row.as_ptr().add($block_idx * Q4_0_BLOCK_BYTES);
                let q8_ptr = q8_input.as_ptr().add($block_idx * Q8_0_BLOCK_BYTES);

                let q4_scale = f16_to_f32_lut(u16::from_le_bytes([*q4_ptr, *q4_ptr.add(1)]));
                let q8_scale = f16_to_f32_lut(u16::from_le_bytes([*q8_ptr, *q8_ptr.add(1)]));
                let combined = _mm256_set1_ps(q4_scale * q8_scale);

                // 16 packed bytes -> 32 nibbles: low nibbles fill the lower
                // 128-bit lane (elements 0-15), high nibbles the upper lane
                // (elements 16-31), matching the wire layout split
                let packed = _mm_loadu_si128(q4_ptr.add(2).cast());
                let shifted = _mm_srli_epi16(packed, 4);
                let nibbles = _mm256_and_si256(_mm256_set_m128i(shifted, packed), nibble_mask);
                let q4_signed = _mm256_sub_epi8(nibbles, bias);

                let q8_vec = _mm256_loadu_si256(q8_ptr.add(2).cast());

                // maddubs needs unsigned x signed; fold q4's sign into q8
                let q4_abs = _mm256_sign_epi8(q4_signed, q4_signed);
                let q8_signed = _mm256_sign_epi8(q8_vec, q4_signed);

                let prod_i16 = _mm256_maddubs_epi16(q4_abs, q8_signed);
                let prod_i32 = _mm256_madd_epi16(prod_i16, ones);
                $acc = _mm256_fmadd_ps(combined, _mm256_cvtepi32_ps(prod_i32), $acc);
            }};
        }

        let mut acc0 = _mm256_setzero_ps();
        let mut acc1 = _mm256_setzero_ps();

        let mut block_idx = 0;
        while block_idx + 2 <= num_blocks {
            block_dot!(block_idx, acc0);
            block_dot!(block_idx + 1, acc1);
            block_idx += 2;
        }
        if block_idx < num_blocks {
            block_dot!(block_idx, acc0);
        }

        let acc = _mm256_add_ps(acc0, acc1);
        let sum128 = _mm_add_ps(_mm256_castps256_ps128(acc), _mm256_extractf128_ps(acc, 1));
        let sum64 = _mm_hadd_ps(sum128, sum128);
        let sum32 = _mm_hadd_ps(sum64, sum64);
        _mm_cvtss_f32(sum32)
    }
}

// ============================================================================
// Tests
// ============================================================================
