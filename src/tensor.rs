use std::mem::size_of;

use tracing::{debug, trace};

use crate::error::{Result, TensorError};

/// Which interpretation of the storage block is currently live
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Representation {
    Float32,
    Int8Quantized,
}

/// Tensor that holds either `length` f32 values or `length` i8 values in one allocation.
///
/// The block is always sized for the float view. The int8 view lives in the low
/// `length` bytes of the same block, so quantizing never reallocates.
#[derive(Debug)]
pub struct TensorStore {
    length: usize,
    representation: Representation,
    storage: Option<Vec<u8>>,
    pub(crate) scale: f32,
    pub(crate) zero_point: i8,
}

impl TensorStore {
    pub fn create(length: usize, initial: Representation) -> Result<Self> {
        let bytes = length
            .checked_mul(size_of::<f32>())
            .ok_or(TensorError::Allocation { length })?;

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(bytes)
            .map_err(|_| TensorError::Allocation { length })?;
        storage.resize(bytes, 0);

        debug!(length, bytes, ?initial, "allocated tensor storage");

        Ok(TensorStore {
            length,
            representation: initial,
            storage: Some(storage),
            scale: 0.0,
            zero_point: 0,
        })
    }

    /// Release the storage block. Calling this again is a no-op.
    pub fn destroy(&mut self) {
        if let Some(storage) = self.storage.take() {
            trace!(bytes = storage.len(), "released tensor storage");
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn zero_point(&self) -> i8 {
        self.zero_point
    }

    pub fn is_released(&self) -> bool {
        self.storage.is_none()
    }

    /// Bytes held by the storage block (0 once released)
    pub fn memory_bytes(&self) -> usize {
        self.storage.as_ref().map_or(0, Vec::len)
    }

    /// Address of the storage block, shared by both views
    pub fn storage_ptr(&self) -> Option<*const u8> {
        self.storage.as_ref().map(|s| s.as_ptr())
    }

    /// Overwrite the float view with `values` and make it live
    pub fn load_f32(&mut self, values: &[f32]) -> Result<()> {
        let length = self.length;
        if values.len() != length {
            return Err(TensorError::LengthMismatch {
                expected: length,
                actual: values.len(),
            });
        }

        let storage = self.storage.as_mut().ok_or(TensorError::Released)?;
        storage.copy_from_slice(bytemuck::cast_slice::<f32, u8>(values));
        self.representation = Representation::Float32;
        Ok(())
    }

    pub fn f32_at(&self, index: usize) -> Result<f32> {
        self.expect_representation(Representation::Float32)?;
        self.check_index(index)?;
        let storage = self.storage.as_ref().ok_or(TensorError::Released)?;
        Ok(read_f32(storage, index))
    }

    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        self.expect_representation(Representation::Float32)?;
        let storage = self.storage.as_ref().ok_or(TensorError::Released)?;
        Ok((0..self.length).map(|i| read_f32(storage, i)).collect())
    }

    pub fn i8_at(&self, index: usize) -> Result<i8> {
        self.expect_representation(Representation::Int8Quantized)?;
        self.check_index(index)?;
        Ok(self.raw_i8()?[index])
    }

    pub fn as_i8_slice(&self) -> Result<&[i8]> {
        self.expect_representation(Representation::Int8Quantized)?;
        self.raw_i8()
    }

    /// Int8 view of the low bytes, regardless of which representation is live
    pub(crate) fn raw_i8(&self) -> Result<&[i8]> {
        let storage = self.storage.as_ref().ok_or(TensorError::Released)?;
        Ok(bytemuck::cast_slice::<u8, i8>(&storage[..self.length]))
    }

    /// Raw storage block, both views included
    pub(crate) fn storage_bytes(&self) -> Result<&[u8]> {
        self.storage.as_deref().ok_or(TensorError::Released)
    }

    pub(crate) fn storage_mut(&mut self) -> Result<&mut [u8]> {
        self.storage
            .as_deref_mut()
            .ok_or(TensorError::Released)
    }

    pub(crate) fn set_quantized(&mut self, scale: f32, zero_point: i8) {
        self.scale = scale;
        self.zero_point = zero_point;
        self.representation = Representation::Int8Quantized;
    }

    pub(crate) fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.length {
            return Err(TensorError::IndexOutOfRange {
                index,
                length: self.length,
            });
        }
        Ok(())
    }

    fn expect_representation(&self, expected: Representation) -> Result<()> {
        if self.storage.is_none() {
            return Err(TensorError::Released);
        }
        if self.representation != expected {
            return Err(TensorError::WrongRepresentation {
                expected,
                found: self.representation,
            });
        }
        Ok(())
    }
}

pub(crate) fn read_f32(storage: &[u8], index: usize) -> f32 {
    let start = index * size_of::<f32>();
    bytemuck::pod_read_unaligned::<f32>(&storage[start..start + size_of::<f32>()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_sizes_block_for_floats() {
        let store = TensorStore::create(5, Representation::Float32).unwrap();
        assert_eq!(store.len(), 5);
        assert_eq!(store.memory_bytes(), 20);
        assert_eq!(store.representation(), Representation::Float32);
        assert_eq!(store.scale(), 0.0);
        assert_eq!(store.zero_point(), 0);
    }

    #[test]
    fn create_int8_still_reserves_float_sized_block() {
        let store = TensorStore::create(3, Representation::Int8Quantized).unwrap();
        assert_eq!(store.memory_bytes(), 12);
        assert_eq!(store.as_i8_slice().unwrap(), &[0, 0, 0]);
    }

    #[test]
    fn create_zero_length() {
        let store = TensorStore::create(0, Representation::Float32).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.memory_bytes(), 0);
        assert_eq!(store.to_f32_vec().unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn create_overflowing_length_fails() {
        let err = TensorStore::create(usize::MAX, Representation::Float32).unwrap_err();
        assert_eq!(err, TensorError::Allocation { length: usize::MAX });
    }

    #[test]
    fn create_unreservable_length_fails() {
        // byte count fits in usize but exceeds isize::MAX
        let length = usize::MAX / 4;
        let err = TensorStore::create(length, Representation::Float32).unwrap_err();
        assert_eq!(err, TensorError::Allocation { length });
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut store = TensorStore::create(4, Representation::Float32).unwrap();
        store.destroy();
        assert!(store.is_released());
        store.destroy();
        assert!(store.is_released());
        assert_eq!(store.memory_bytes(), 0);
        assert_eq!(store.f32_at(0), Err(TensorError::Released));
    }

    #[test]
    fn float_view_round_trips() {
        let mut store = TensorStore::create(3, Representation::Float32).unwrap();
        store.load_f32(&[1.5, -2.25, 3.0]).unwrap();
        assert_eq!(store.f32_at(1).unwrap(), -2.25);
        assert_eq!(store.to_f32_vec().unwrap(), vec![1.5, -2.25, 3.0]);
        assert_eq!(
            &store.storage_bytes().unwrap()[4..8],
            &(-2.25f32).to_ne_bytes()
        );
    }

    #[test]
    fn load_rejects_wrong_length() {
        let mut store = TensorStore::create(3, Representation::Float32).unwrap();
        assert_eq!(
            store.load_f32(&[1.0]),
            Err(TensorError::LengthMismatch {
                expected: 3,
                actual: 1
            })
        );
    }

    #[test]
    fn views_are_gated_by_representation() {
        let store = TensorStore::create(2, Representation::Float32).unwrap();
        assert_eq!(
            store.i8_at(0),
            Err(TensorError::WrongRepresentation {
                expected: Representation::Int8Quantized,
                found: Representation::Float32,
            })
        );
        assert!(store.as_i8_slice().is_err());
    }

    #[test]
    fn accessors_check_bounds() {
        let store = TensorStore::create(2, Representation::Float32).unwrap();
        assert_eq!(
            store.f32_at(2),
            Err(TensorError::IndexOutOfRange {
                index: 2,
                length: 2
            })
        );
    }
}
