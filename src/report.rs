//! Round-trip diagnostics for a quantized tensor

use std::fmt;

use crate::error::{Result, TensorError};
use crate::quantization::{dequantize_all, mean_squared_error};
use crate::tensor::TensorStore;

#[derive(Clone, Debug, PartialEq)]
pub struct ElementError {
    pub original: f32,
    pub recovered: f32,
    /// original - recovered
    pub error: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoundTripReport {
    pub scale: f32,
    pub zero_point: i8,
    pub elements: Vec<ElementError>,
}

impl RoundTripReport {
    /// Compare `original` against what `store` recovers for every element
    pub fn new(original: &[f32], store: &TensorStore) -> Result<Self> {
        if original.len() != store.len() {
            return Err(TensorError::LengthMismatch {
                expected: store.len(),
                actual: original.len(),
            });
        }

        let elements = original
            .iter()
            .zip(dequantize_all(store)?)
            .map(|(&original, recovered)| ElementError {
                original,
                recovered,
                error: original - recovered,
            })
            .collect();

        Ok(RoundTripReport {
            scale: store.scale(),
            zero_point: store.zero_point(),
            elements,
        })
    }

    pub fn max_abs_error(&self) -> f32 {
        self.elements
            .iter()
            .map(|e| e.error.abs())
            .fold(0.0, f32::max)
    }

    pub fn mse(&self) -> f32 {
        let (original, recovered): (Vec<f32>, Vec<f32>) = self
            .elements
            .iter()
            .map(|e| (e.original, e.recovered))
            .unzip();
        mean_squared_error(&original, &recovered)
    }

    /// Every element recovered within one quantization step
    pub fn within_one_step(&self) -> bool {
        self.max_abs_error() <= self.scale
    }
}

impl fmt::Display for RoundTripReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scale: {:.6} | Zero Point: {}", self.scale, self.zero_point)?;
        for e in &self.elements {
            writeln!(
                f,
                "Original: {:6.2} | Recovered: {:6.2} | Error: {:6.4}",
                e.original, e.recovered, e.error
            )?;
        }
        write!(
            f,
            "Max |error|: {:.4} | MSE: {:.6}",
            self.max_abs_error(),
            self.mse()
        )
    }
}
