//! Tagged tensor buffer views
//!
//! Buffers enter the kernels as caller-owned flat slices tagged with a numeric
//! format. [`TensorView`] is the zero-copy boundary type: one borrowing variant
//! per format, so the dispatcher can match on the (weights, input) pairing and
//! hand each kernel a raw typed slice without any allocation or cast gymnastics.
//!
//! Quantized variants carry raw bytes in the exact binary block layout written
//! by the quantizer (see [`crate::quantize`]); the `F32` variant carries an
//! already-typed float slice since activations live in f32 on the host side.

use crate::quantize::{BLOCK_SIZE, Q4_0_BLOCK_BYTES, Q8_0_BLOCK_BYTES};

/// Numeric format tag for a tensor buffer
///
/// Travels alongside every buffer passed into the dispatcher; the buffer
/// itself carries no self-describing header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Dtype {
    /// Dense 32-bit float
    F32,
    /// Dense IEEE 754 half-precision, little-endian byte pairs
    F16,
    /// 4-bit block quantization: 32 values per block, f16 scale + 16 packed bytes
    Q4_0,
    /// 8-bit block quantization: 32 values per block, f16 scale + 32 int8 values
    Q8_0,
}

impl Dtype {
    /// Bytes occupied by one row of `n` elements in this format
    ///
    /// Quantized formats round up to whole blocks; dense formats are exact.
    #[must_use]
    pub fn row_bytes(self, n: usize) -> usize {
        match self {
            Dtype::F32 => n * 4,
            Dtype::F16 => n * 2,
            Dtype::Q4_0 => n.div_ceil(BLOCK_SIZE) * Q4_0_BLOCK_BYTES,
            Dtype::Q8_0 => n.div_ceil(BLOCK_SIZE) * Q8_0_BLOCK_BYTES,
        }
    }
}

/// Borrowed, format-tagged view over a caller-owned tensor buffer
///
/// Ownership stays with the caller for the full call; kernels only read
/// through the view. The variant is the format tag.
#[derive(Debug, Clone, Copy)]
#[allow(non_camel_case_types)]
pub enum TensorView<'a> {
    /// Dense f32 values
    F32(&'a [f32]),
    /// Dense f16 values as little-endian byte pairs
    F16(&'a [u8]),
    /// Q4_0 blocks (18 bytes per 32 values)
    Q4_0(&'a [u8]),
    /// Q8_0 blocks (34 bytes per 32 values)
    Q8_0(&'a [u8]),
}

impl TensorView<'_> {
    /// The format tag for this view
    #[must_use]
    pub fn dtype(&self) -> Dtype {
        match self {
            TensorView::F32(_) => Dtype::F32,
            TensorView::F16(_) => Dtype::F16,
            TensorView::Q4_0(_) => Dtype::Q4_0,
            TensorView::Q8_0(_) => Dtype::Q8_0,
        }
    }

    /// Length of the underlying buffer in bytes
    #[must_use]
    pub fn len_bytes(&self) -> usize {
        match self {
            TensorView::F32(data) => data.len() * 4,
            TensorView::F16(data) | TensorView::Q4_0(data) | TensorView::Q8_0(data) => data.len(),
        }
    }
}
