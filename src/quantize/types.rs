//! Block quantization type definitions
//!
//! Common constants and the per-block structs for the two width-32 formats.
//!
//! ## Contents
//! - Constants: [`BLOCK_SIZE`], [`Q4_0_BLOCK_BYTES`], [`Q8_0_BLOCK_BYTES`]
//! - Block structs: [`Q4_0Block`], [`Q8_0Block`] with symmetric quantizers,
//!   per-block dequantization and wire encoding

use half::f16;

/// Elements per quantization block, shared by `Q4_0` and `Q8_0`
///
/// The two formats use the same block width so they can be multiplied against
/// each other block-by-block in the integer dot-product kernel.
pub const BLOCK_SIZE: usize = 32;

/// Wire size of one `Q4_0` block: 2-byte f16 scale + 16 packed nibble bytes
pub const Q4_0_BLOCK_BYTES: usize = 2 + 16;

/// Wire size of one `Q8_0` block: 2-byte f16 scale + 32 int8 values
pub const Q8_0_BLOCK_BYTES: usize = 2 + 32;

/// `Q4_0` quantized block
///
/// Each block covers 32 values:
/// - 1 half-precision scale factor
/// - 16 bytes of packed 4-bit values (2 per byte)
///
/// Nibble layout is a binary compatibility requirement: the low nibble of
/// byte `j` is element `j`, the high nibble is element `j + 16` (first-half /
/// second-half split, not interleaved). Reconstruction: `(nibble - 8) * scale`.
#[derive(Debug, Clone)]
#[allow(non_camel_case_types)]
pub struct Q4_0Block {
    /// Scale factor for dequantization
    pub scale: f32,
    /// Packed 4-bit values (16 bytes = 32 values)
    pub quants: [u8; 16],
}

impl Q4_0Block {
    /// Quantize 32 f32 values to `Q4_0`
    ///
    /// Symmetric quantization: the signed value with the largest magnitude
    /// maps exactly to the nibble 0 (`-8` after bias), so
    /// `scale = extreme / -8`. Remaining values round to the nearest step and
    /// clamp into the nibble range.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn quantize(values: &[f32; 32]) -> Self {
        // Track the signed extreme, not just the magnitude: the sign decides
        // which end of the nibble range maps exactly.
        let mut amax = 0.0f32;
        let mut extreme = 0.0f32;
        for &v in values {
            if v.abs() > amax {
                amax = v.abs();
                extreme = v;
            }
        }

        let scale = extreme / -8.0;
        let inv_scale = if scale == 0.0 { 0.0 } else { 1.0 / scale };

        let mut quants = [0u8; 16];
        for j in 0..16 {
            // values/scale lands in [-8, 8]; +8.5 rounds and re-biases in one
            // step, the min(15) clamp catches the +8 corner.
            let lo = (values[j] * inv_scale + 8.5).min(15.0) as u8;
            let hi = (values[j + 16] * inv_scale + 8.5).min(15.0) as u8;
            quants[j] = lo | (hi << 4);
        }

        Self { scale, quants }
    }

    /// Dequantize the block back to 32 f32 values
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn dequantize(&self) -> [f32; 32] {
        let mut values = [0.0f32; 32];
        for (j, &byte) in self.quants.iter().enumerate() {
            let lo = (byte & 0x0F) as i8 - 8;
            let hi = (byte >> 4) as i8 - 8;
            values[j] = self.scale * f32::from(lo);
            values[j + 16] = self.scale * f32::from(hi);
        }
        values
    }

    /// Encode the block in its 18-byte wire layout
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Q4_0_BLOCK_BYTES] {
        let mut bytes = [0u8; Q4_0_BLOCK_BYTES];
        bytes[..2].copy_from_slice(&f16::from_f32(self.scale).to_le_bytes());
        bytes[2..].copy_from_slice(&self.quants);
        bytes
    }

    /// Decode a block from its 18-byte wire layout
    #[must_use]
    pub fn from_bytes(bytes: &[u8; Q4_0_BLOCK_BYTES]) -> Self {
        let scale = f16::from_le_bytes([bytes[0], bytes[1]]).to_f32();
        let mut quants = [0u8; 16];
        quants.copy_from_slice(&bytes[2..]);
        Self { scale, quants }
    }
}

/// `Q8_0` quantized block
///
/// Each block covers 32 values:
/// - 1 half-precision scale factor
/// - 32 int8 values
///
/// Reconstruction: `value * scale`.
#[derive(Debug, Clone)]
#[allow(non_camel_case_types)]
pub struct Q8_0Block {
    /// Scale factor for dequantization
    pub scale: f32,
    /// Quantized values
    pub quants: [i8; 32],
}

impl Q8_0Block {
    /// Quantize 32 f32 values to `Q8_0`
    ///
    /// Symmetric quantization: `scale = max(abs(values)) / 127`. Used for
    /// on-the-fly activation quantization ahead of the integer dot-product
    /// kernel, so it avoids allocation entirely.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn quantize(values: &[f32; 32]) -> Self {
        let max_abs = values.iter().map(|v| v.abs()).fold(0.0f32, f32::max);

        // Minimal scale for near-zero blocks avoids division by zero
        let scale = if max_abs > 1e-10 {
            max_abs / 127.0
        } else {
            1.0 / 127.0
        };
        let inv_scale = 1.0 / scale;

        let mut quants = [0i8; 32];
        for (q, &v) in quants.iter_mut().zip(values.iter()) {
            *q = (v * inv_scale).round().clamp(-128.0, 127.0) as i8;
        }

        Self { scale, quants }
    }

    /// Dequantize the block back to 32 f32 values
    #[must_use]
    pub fn dequantize(&self) -> [f32; 32] {
        let mut values = [0.0f32; 32];
        for (v, &q) in values.iter_mut().zip(self.quants.iter()) {
            *v = f32::from(q) * self.scale;
        }
        values
    }

    /// Encode the block in its 34-byte wire layout
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn to_bytes(&self) -> [u8; Q8_0_BLOCK_BYTES] {
        let mut bytes = [0u8; Q8_0_BLOCK_BYTES];
        bytes[..2].copy_from_slice(&f16::from_f32(self.scale).to_le_bytes());
        for (dst, &q) in bytes[2..].iter_mut().zip(self.quants.iter()) {
            *dst = q as u8;
        }
        bytes
    }

    /// Maximum absolute reconstruction error against the original values
    #[must_use]
    pub fn quantization_error(&self, original: &[f32; 32]) -> f32 {
        let dequantized = self.dequantize();
        original
            .iter()
            .zip(dequantized.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max)
    }
}
