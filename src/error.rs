//! Error types for kernel operations
//!
//! Two classes of failure surface here:
//! - [`KernelError::UnsupportedFormats`]: no kernel exists for the requested
//!   weight/input format pairing. This is a configuration bug expected to be
//!   caught before any hot-path invocation; there is no fallback numeric path
//!   because silently picking a different kernel would silently change results.
//! - [`KernelError::InvalidShape`]: a buffer's byte length does not match the
//!   dimensions declared alongside it.
//!
//! Alignment and divisibility contract violations (lengths that are not a
//! multiple of the SIMD width or the quantization block size) are `assert!`
//! faults in the kernels themselves, not recoverable errors: they indicate a
//! mismatch between a model's declared dimensions and the data supplied, which
//! cannot be safely continued from.

use crate::tensor::Dtype;
use thiserror::Error;

/// Error type for kernel dispatch and shape validation
#[derive(Debug, Error)]
pub enum KernelError {
    /// No kernel is defined for this weight/input format pairing
    #[error("unsupported format pair: weights {weights:?}, input {input:?}")]
    UnsupportedFormats {
        /// Declared format of the weight matrix
        weights: Dtype,
        /// Declared format of the input vector
        input: Dtype,
    },

    /// Buffer length does not match the declared dimensions
    #[error("invalid shape: {reason}")]
    InvalidShape {
        /// Human-readable description of the mismatch
        reason: String,
    },
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, KernelError>;
