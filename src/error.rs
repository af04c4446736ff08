use thiserror::Error;

use crate::tensor::Representation;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
    #[error("Failed to reserve storage for {length} f32 elements")]
    Allocation { length: usize },

    #[error("Index {index} out of range for tensor of length {length}")]
    IndexOutOfRange { index: usize, length: usize },

    #[error("Input length mismatch: expected {expected} elements, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Wrong representation: expected {expected:?}, found {found:?}")]
    WrongRepresentation {
        expected: Representation,
        found: Representation,
    },

    #[error("Tensor storage has already been released")]
    Released,
}

pub type Result<T> = std::result::Result<T, TensorError>;
