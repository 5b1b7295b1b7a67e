//! # Calcular
//!
//! CPU compute kernels for quantized LLM inference: matrix-vector
//! multiplication over mixed numeric formats (f32, f16, and two width-32
//! block-quantized integer formats), plus the elementwise primitives that
//! surround it (softmax, RMS normalization, dot product).
//!
//! The crate is the numeric core of an inference engine; everything around
//! it (weight loading, tokenization, sampling, serving) is an external
//! collaborator that supplies buffers, format tags and thread partition
//! coordinates, and consumes the written output buffer. No entry point
//! allocates beyond small fixed-size scratch, retains state across calls,
//! blocks, or touches I/O.
//!
//! ## Formats
//!
//! | Weights | Input | Kernel |
//! |---------|-------|--------|
//! | `F32`   | `F32` | dense inner product |
//! | `F16`   | `F32` | on-the-fly half-precision conversion |
//! | `Q4_0`  | `F32` | group-wise dequantize + inner product |
//! | `Q4_0`  | `Q8_0`| block-paired integer dot product |
//!
//! Every kernel has an AVX2 path selected at runtime and a portable scalar
//! path with the same accumulation semantics.
//!
//! ## Threading
//!
//! Partition-aware entry points ([`matmul`], [`ops::rmsnorm`]) are pure
//! functions of their inputs plus `(thread_count, thread_index)`; ranges for
//! distinct indices never overlap, so concurrent callers share the output
//! buffer without locks. [`parallel`] provides a rayon fan-out for callers
//! without their own worker pool.
//!
//! ## Example
//!
//! ```rust
//! use calcular::{matmul, TensorView};
//!
//! let weights = vec![1.0f32, 0.0, 0.0, 1.0]; // 2x2 identity
//! let input = vec![3.0f32, 7.0];
//! let mut output = vec![0.0f32; 2];
//!
//! matmul(
//!     &mut output,
//!     TensorView::F32(&input),
//!     TensorView::F32(&weights),
//!     2, // n
//!     2, // d
//!     1, // thread_count
//!     0, // thread_index
//! )?;
//! assert_eq!(output, vec![3.0, 7.0]);
//! # Ok::<(), calcular::KernelError>(())
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // usize -> f32 for means/scales is fine
#![allow(clippy::inline_always)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)] // contract asserts are documented in prose

pub mod error;
pub mod kernels;
pub mod ops;
pub mod parallel;
pub mod quantize;
pub mod tensor;

pub use error::{KernelError, Result};
pub use kernels::{matmul, thread_row_range};
pub use ops::{dot_product, rms_inv, rmsnorm, softmax};
pub use parallel::{matmul_parallel, rmsnorm_parallel};
pub use tensor::{Dtype, TensorView};
