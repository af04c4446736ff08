//! Per-tensor affine int8 quantization over a single reinterpreted buffer.
//!
//! A [`TensorStore`] owns one block sized for `length` f32 values. Quantizing
//! rewrites its low `length` bytes as i8 and records the scale and zero point,
//! so the float and int8 views share one allocation.

pub mod error;
pub mod quantization;
pub mod report;
pub mod tensor;

pub use error::{Result, TensorError};
pub use quantization::{
    dequantize, dequantize_all, quantize, quantize_in_place, AffineQuantizer, Quantizer8Bit,
};
pub use report::RoundTripReport;
pub use tensor::{Representation, TensorStore};
