use std::mem::size_of;

use tracing::{debug, instrument, trace};

use crate::error::{Result, TensorError};
use crate::tensor::{read_f32, Representation, TensorStore};

/// Number of steps between the smallest and largest i8 value
const INT8_STEPS: f32 = 255.0;

pub trait Quantizer8Bit {
    fn quantize(&self, real_val: f32) -> i8;
    fn dequantize(&self, q_val: i8) -> f32;
}

/// Per-tensor affine int8 scheme: real = scale * (q - zero_point)
///
/// Both the zero point and the quantized values are narrowed with `as i8`,
/// i.e. truncated toward zero and saturated to [-128, 127] (NaN becomes 0).
/// No rounding to nearest is applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineQuantizer {
    pub scale: f32,
    pub zero_point: i8,
}

impl AffineQuantizer {
    pub fn new(min_val: f32, max_val: f32) -> Self {
        let mut scale = (max_val - min_val) / INT8_STEPS;
        // zero dynamic range, e.g. constant input
        if scale == 0.0 {
            scale = 1.0;
        }
        let zero_point = (-min_val / scale - 128.0) as i8;
        AffineQuantizer { scale, zero_point }
    }

    pub fn from_values(values: &[f32]) -> Self {
        let (min_val, max_val) = min_and_max(values);
        Self::new(min_val, max_val)
    }
}

impl Quantizer8Bit for AffineQuantizer {
    fn quantize(&self, real_val: f32) -> i8 {
        (real_val / self.scale + f32::from(self.zero_point)) as i8
    }

    fn dequantize(&self, q_val: i8) -> f32 {
        self.scale * f32::from(i16::from(q_val) - i16::from(self.zero_point))
    }
}

/// Dynamic range of `values`; an empty slice has range (0, 0)
pub fn min_and_max(values: &[f32]) -> (f32, f32) {
    let Some(&first) = values.first() else {
        return (0.0, 0.0);
    };
    values[1..]
        .iter()
        .fold((first, first), |(lo, hi), &v| {
            (if v < lo { v } else { lo }, if v > hi { v } else { hi })
        })
}

/// Quantize `input` into `store`, reinterpreting its storage as int8.
///
/// `input` must have exactly `store.len()` elements.
#[instrument(level = "debug", skip_all, fields(length = store.len()))]
pub fn quantize(store: &mut TensorStore, input: &[f32]) -> Result<()> {
    if input.len() != store.len() {
        return Err(TensorError::LengthMismatch {
            expected: store.len(),
            actual: input.len(),
        });
    }

    let quantizer = AffineQuantizer::from_values(input);
    let length = store.len();
    let storage = store.storage_mut()?;
    let (codes, rest) = storage.split_at_mut(length);
    for (q, &x) in bytemuck::cast_slice_mut::<u8, i8>(codes).iter_mut().zip(input) {
        *q = quantizer.quantize(x);
    }
    // stale float bytes past the int8 view
    rest.fill(0);

    store.set_quantized(quantizer.scale, quantizer.zero_point);
    debug!(
        scale = quantizer.scale,
        zero_point = quantizer.zero_point,
        "quantized f32 -> i8"
    );
    Ok(())
}

/// Quantize the store's own float contents without a second buffer.
///
/// Element `i` is read from bytes `4i..4i+4` before byte `i` is written, and
/// `i <= 4i`, so a forward pass never overwrites a float it still needs.
#[instrument(level = "debug", skip_all, fields(length = store.len()))]
pub fn quantize_in_place(store: &mut TensorStore) -> Result<()> {
    if store.is_released() {
        return Err(TensorError::Released);
    }
    if store.representation() != Representation::Float32 {
        return Err(TensorError::WrongRepresentation {
            expected: Representation::Float32,
            found: store.representation(),
        });
    }

    let length = store.len();
    let storage = store.storage_mut()?;

    let mut range = None;
    for i in 0..length {
        let v = read_f32(storage, i);
        range = Some(match range {
            None => (v, v),
            Some((lo, hi)) => (if v < lo { v } else { lo }, if v > hi { v } else { hi }),
        });
    }
    let (min_val, max_val) = range.unwrap_or((0.0, 0.0));
    let quantizer = AffineQuantizer::new(min_val, max_val);

    for i in 0..length {
        let v = read_f32(storage, i);
        storage[i] = bytemuck::cast::<i8, u8>(quantizer.quantize(v));
    }
    // stale float bytes past the int8 view
    storage[length..].fill(0);
    trace!(freed_bytes = length * (size_of::<f32>() - 1), "int8 view in low bytes");

    store.set_quantized(quantizer.scale, quantizer.zero_point);
    debug!(
        scale = quantizer.scale,
        zero_point = quantizer.zero_point,
        "quantized f32 -> i8 in place"
    );
    Ok(())
}

/// Recover an approximate float from the int8 view.
///
/// The representation tag is not checked: reading a store whose float view is
/// live returns meaningless values. The index is always checked.
pub fn dequantize(store: &TensorStore, index: usize) -> Result<f32> {
    store.check_index(index)?;
    let q_val = store.raw_i8()?[index];
    Ok(store.quantizer().dequantize(q_val))
}

pub fn dequantize_all(store: &TensorStore) -> Result<Vec<f32>> {
    let quantizer = store.quantizer();
    Ok(store
        .raw_i8()?
        .iter()
        .map(|&q| quantizer.dequantize(q))
        .collect())
}

pub fn mean_squared_error(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Number of values must be equal");
    if a.is_empty() {
        return 0.0;
    }
    let n = a.len() as f32;
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y).powi(2))
        .sum::<f32>()
        / n
}

impl TensorStore {
    /// Parameters recorded by the last quantize
    pub fn quantizer(&self) -> AffineQuantizer {
        AffineQuantizer {
            scale: self.scale,
            zero_point: self.zero_point,
        }
    }
}
