//! Dequantization for the block formats and dense f16
//!
//! ## Contents
//! - [`dequantize_q4_0_row`] / [`dequantize_q8_0_row`] - block-exact row
//!   decode into a caller-provided buffer, used inside the matmul kernels
//! - [`dequantize_q4_0`] / [`dequantize_q8_0`] / [`dequantize_f16`] -
//!   whole-buffer decode with shape validation
//!
//! `Q4_0` nibble order follows the wire contract: positions 0-15 of a block
//! come from the low nibbles of bytes 0-15, positions 16-31 from the high
//! nibbles of the same bytes.

use crate::error::{KernelError, Result};
use crate::quantize::{f16_to_f32_lut, BLOCK_SIZE, Q4_0_BLOCK_BYTES, Q8_0_BLOCK_BYTES};

/// Dequantize a row of `Q4_0` blocks into `out`
///
/// `row` must hold exactly `out.len() / 32` blocks. Length mismatches are
/// programming faults: they signal a disagreement between the declared row
/// width and the stored data, which has no safe continuation.
#[allow(clippy::cast_possible_wrap)]
pub fn dequantize_q4_0_row(row: &[u8], out: &mut [f32]) {
    assert!(
        out.len().is_multiple_of(BLOCK_SIZE),
        "Q4_0 row length {} is not a multiple of the block size",
        out.len()
    );
    assert_eq!(
        row.len(),
        (out.len() / BLOCK_SIZE) * Q4_0_BLOCK_BYTES,
        "Q4_0 row data does not match {} output elements",
        out.len()
    );

    for (block, out_block) in row
        .chunks_exact(Q4_0_BLOCK_BYTES)
        .zip(out.chunks_exact_mut(BLOCK_SIZE))
    {
        let scale = f16_to_f32_lut(u16::from_le_bytes([block[0], block[1]]));
        for (j, &byte) in block[2..].iter().enumerate() {
            let lo = (byte & 0x0F) as i8 - 8;
            let hi = (byte >> 4) as i8 - 8;
            out_block[j] = scale * f32::from(lo);
            out_block[j + 16] = scale * f32::from(hi);
        }
    }
}

/// Dequantize a row of `Q8_0` blocks into `out`
#[allow(clippy::cast_possible_wrap)]
pub fn dequantize_q8_0_row(row: &[u8], out: &mut [f32]) {
    assert!(
        out.len().is_multiple_of(BLOCK_SIZE),
        "Q8_0 row length {} is not a multiple of the block size",
        out.len()
    );
    assert_eq!(
        row.len(),
        (out.len() / BLOCK_SIZE) * Q8_0_BLOCK_BYTES,
        "Q8_0 row data does not match {} output elements",
        out.len()
    );

    for (block, out_block) in row
        .chunks_exact(Q8_0_BLOCK_BYTES)
        .zip(out.chunks_exact_mut(BLOCK_SIZE))
    {
        let scale = f16_to_f32_lut(u16::from_le_bytes([block[0], block[1]]));
        for (o, &byte) in out_block.iter_mut().zip(block[2..].iter()) {
            *o = scale * f32::from(byte as i8);
        }
    }
}

/// Dequantize a whole `Q4_0` buffer
///
/// # Errors
///
/// Returns [`KernelError::InvalidShape`] if the data length is not a multiple
/// of the 18-byte block size.
pub fn dequantize_q4_0(data: &[u8]) -> Result<Vec<f32>> {
    if !data.len().is_multiple_of(Q4_0_BLOCK_BYTES) {
        return Err(KernelError::InvalidShape {
            reason: format!(
                "Q4_0 data length {} is not a multiple of block size {}",
                data.len(),
                Q4_0_BLOCK_BYTES
            ),
        });
    }

    let num_values = (data.len() / Q4_0_BLOCK_BYTES) * BLOCK_SIZE;
    let mut result = vec![0.0f32; num_values];
    dequantize_q4_0_row(data, &mut result);
    Ok(result)
}

/// Dequantize a whole `Q8_0` buffer
///
/// # Errors
///
/// Returns [`KernelError::InvalidShape`] if the data length is not a multiple
/// of the 34-byte block size.
pub fn dequantize_q8_0(data: &[u8]) -> Result<Vec<f32>> {
    if !data.len().is_multiple_of(Q8_0_BLOCK_BYTES) {
        return Err(KernelError::InvalidShape {
            reason: format!(
                "Q8_0 data length {} is not a multiple of block size {}",
                data.len(),
                Q8_0_BLOCK_BYTES
            ),
        });
    }

    let num_values = (data.len() / Q8_0_BLOCK_BYTES) * BLOCK_SIZE;
    let mut result = vec![0.0f32; num_values];
    dequantize_q8_0_row(data, &mut result);
    Ok(result)
}

/// Decode a dense f16 buffer (little-endian byte pairs) to f32
///
/// # Errors
///
/// Returns [`KernelError::InvalidShape`] if the data length is odd.
pub fn dequantize_f16(data: &[u8]) -> Result<Vec<f32>> {
    if !data.len().is_multiple_of(2) {
        return Err(KernelError::InvalidShape {
            reason: format!("F16 data length {} is not a multiple of 2", data.len()),
        });
    }

    Ok(data
        .chunks_exact(2)
        .map(|pair| f16_to_f32_lut(u16::from_le_bytes([pair[0], pair[1]])))
        .collect())
}
