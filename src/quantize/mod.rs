//! Block quantization codec
//!
//! Implements the two width-32 block formats the kernels operate on, plus the
//! dense half-precision decode used wherever f16 weights or f16 block scales
//! appear:
//! - `Q4_0`: 4-bit symmetric quantization, 18 bytes per block
//!   (f16 scale + 16 packed nibble bytes)
//! - `Q8_0`: 8-bit symmetric quantization, 34 bytes per block
//!   (f16 scale + 32 int8 values)
//! - `F16`: IEEE 754 half-precision, little-endian byte pairs
//!
//! ## `Q4_0` layout
//!
//! A block's 32 values are packed two per byte with a first-half/second-half
//! split: the low nibble of byte `j` is element `j`, the high nibble is
//! element `j + 16`. Each nibble reconstructs as `(nibble - 8) * scale`. This
//! layout is a binary interoperability contract with externally produced
//! weight files, not an implementation choice.
//!
//! ## `Q8_0` layout
//!
//! 32 int8 values following the scale, reconstructing as `value * scale`.
//! `Q8_0` is also the on-the-fly activation format consumed by the
//! `Q4_0` x `Q8_0` integer dot-product kernel.

pub mod dequant;
pub mod types;

pub use dequant::{
    dequantize_f16, dequantize_q4_0, dequantize_q4_0_row, dequantize_q8_0, dequantize_q8_0_row,
};
pub use types::{Q4_0Block, Q8_0Block, BLOCK_SIZE, Q4_0_BLOCK_BYTES, Q8_0_BLOCK_BYTES};

use crate::error::{KernelError, Result};

/// Pre-computed f16 to f32 lookup table (65536 entries = 256KB)
///
/// Eliminates per-block f16 conversion overhead in the hot kernel paths.
/// Initialized once on first access, immutable thereafter.
static F16_TO_F32_LUT: std::sync::LazyLock<Box<[f32; 65536]>> = std::sync::LazyLock::new(|| {
    let mut lut = Box::new([0.0f32; 65536]);
    for (i, slot) in lut.iter_mut().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        {
            *slot = half::f16::from_bits(i as u16).to_f32();
        }
    }
    lut
});

/// Fast f16 to f32 conversion using the pre-computed LUT
///
/// Takes raw u16 bits (little-endian) and returns the f32 value.
#[inline]
pub(crate) fn f16_to_f32_lut(bits: u16) -> f32 {
    F16_TO_F32_LUT[bits as usize]
}

/// Quantize f32 values to packed `Q4_0` blocks
///
/// Reference weight quantizer producing the exact 18-byte wire layout.
///
/// # Errors
///
/// Returns [`KernelError::InvalidShape`] if the length is not a multiple of 32.
pub fn quantize_q4_0(values: &[f32]) -> Result<Vec<u8>> {
    if !values.len().is_multiple_of(BLOCK_SIZE) {
        return Err(KernelError::InvalidShape {
            reason: format!(
                "Q4_0 quantization requires length multiple of {}, got {}",
                BLOCK_SIZE,
                values.len()
            ),
        });
    }

    let mut data = Vec::with_capacity((values.len() / BLOCK_SIZE) * Q4_0_BLOCK_BYTES);
    for chunk in values.chunks_exact(BLOCK_SIZE) {
        let arr: [f32; 32] = chunk.try_into().expect("chunk is exactly 32 elements");
        data.extend_from_slice(&Q4_0Block::quantize(&arr).to_bytes());
    }
    Ok(data)
}

/// Quantize f32 values to packed `Q8_0` blocks
///
/// Used to quantize an activation vector once per matmul call ahead of the
/// `Q4_0` x `Q8_0` integer kernel, amortizing the cost over all output rows.
///
/// # Errors
///
/// Returns [`KernelError::InvalidShape`] if the length is not a multiple of 32.
pub fn quantize_q8_0(values: &[f32]) -> Result<Vec<u8>> {
    if !values.len().is_multiple_of(BLOCK_SIZE) {
        return Err(KernelError::InvalidShape {
            reason: format!(
                "Q8_0 quantization requires length multiple of {}, got {}",
                BLOCK_SIZE,
                values.len()
            ),
        });
    }

    let mut data = Vec::with_capacity((values.len() / BLOCK_SIZE) * Q8_0_BLOCK_BYTES);
    for chunk in values.chunks_exact(BLOCK_SIZE) {
        let arr: [f32; 32] = chunk.try_into().expect("chunk is exactly 32 elements");
        data.extend_from_slice(&Q8_0Block::quantize(&arr).to_bytes());
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f16_lut_matches_half_crate() {
        for bits in [0u16, 0x3C00, 0xBC00, 0x7BFF, 0x0001] {
            let expected = half::f16::from_bits(bits).to_f32();
            assert_eq!(f16_to_f32_lut(bits), expected);
        }
    }

    #[test]
    fn test_quantize_q4_0_round_trip_bound() {
        let values: Vec<f32> = (0..64).map(|i| (i as f32 - 32.0) * 0.17).collect();
        let data = quantize_q4_0(&values).unwrap();
        assert_eq!(data.len(), 2 * Q4_0_BLOCK_BYTES);

        let restored = dequantize_q4_0(&data).unwrap();
        for (block_idx, chunk) in values.chunks_exact(BLOCK_SIZE).enumerate() {
            let scale = half::f16::from_le_bytes([
                data[block_idx * Q4_0_BLOCK_BYTES],
                data[block_idx * Q4_0_BLOCK_BYTES + 1],
            ])
            .to_f32();
            for (j, &v) in chunk.iter().enumerate() {
                let err = (v - restored[block_idx * BLOCK_SIZE + j]).abs();
                // One quantization step covers the worst (clamped) corner
                assert!(err <= scale.abs() + 1e-3, "err {err} > step {scale}");
            }
        }
    }

    #[test]
    fn test_quantize_q8_0_round_trip_bound() {
        let values: Vec<f32> = (0..32).map(|i| (i as f32 - 16.0) * 1.3).collect();
        let data = quantize_q8_0(&values).unwrap();
        let restored = dequantize_q8_0(&data).unwrap();

        let scale = half::f16::from_le_bytes([data[0], data[1]]).to_f32();
        for (v, r) in values.iter().zip(restored.iter()) {
            assert!((v - r).abs() <= scale * 0.5 + 2e-2);
        }
    }

    #[test]
    fn test_quantize_rejects_partial_blocks() {
        assert!(quantize_q4_0(&[0.0; 31]).is_err());
        assert!(quantize_q8_0(&[0.0; 33]).is_err());
    }
}
