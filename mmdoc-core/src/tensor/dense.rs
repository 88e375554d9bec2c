//! Backend-neutral dense tensor payload

use std::fmt;

use crate::error::{Error, Result};

/// Name of the only element type carried on the wire
pub const DENSE_DTYPE: &str = "float32";

/// A row-major `f32` tensor used to move values between backends
///
/// This is the common currency of the backends: every backend can export
/// its native tensor into a `DenseTensor` and build a native tensor from one.
#[derive(Clone, PartialEq)]
pub struct DenseTensor {
    /// Shape of the tensor (dimensions)
    shape: Vec<usize>,

    /// Elements in row-major order
    data: Vec<f32>,
}

impl DenseTensor {
    /// Create a tensor from a shape and row-major data
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected_size = Self::element_count(&shape)?;
        if data.len() != expected_size {
            return Err(Error::Backend(format!(
                "data length {} does not match shape {:?} ({} elements)",
                data.len(),
                shape,
                expected_size
            )));
        }

        Ok(Self { shape, data })
    }

    /// Create a zero-filled tensor
    pub fn zeros(shape: Vec<usize>) -> Result<Self> {
        let size = Self::element_count(&shape)?;
        Ok(Self {
            shape,
            data: vec![0.0; size],
        })
    }

    /// Decode a tensor from little-endian `f32` bytes
    pub fn from_bytes(shape: Vec<usize>, bytes: &[u8]) -> Result<Self> {
        let element_size = std::mem::size_of::<f32>();
        if bytes.len() % element_size != 0 {
            return Err(Error::Backend(format!(
                "buffer of {} bytes is not a whole number of {} values",
                bytes.len(),
                DENSE_DTYPE
            )));
        }

        let data: Vec<f32> = bytes
            .chunks_exact(element_size)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Self::new(shape, data)
    }

    /// Encode the elements as little-endian `f32` bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        if cfg!(target_endian = "little") {
            bytemuck::cast_slice::<f32, u8>(&self.data).to_vec()
        } else {
            self.data.iter().flat_map(|v| v.to_le_bytes()).collect()
        }
    }

    fn element_count(shape: &[usize]) -> Result<usize> {
        shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| Error::Backend(format!("shape {shape:?} overflows the element count")))
    }

    /// Get the shape of this tensor
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the elements in row-major order
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Get the number of dimensions
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get the total number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the tensor has no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the encoded payload in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Split into shape and data
    pub fn into_parts(self) -> (Vec<usize>, Vec<f32>) {
        (self.shape, self.data)
    }
}

impl fmt::Debug for DenseTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DenseTensor<{}>{{ shape: {:?}, size: {} }}", DENSE_DTYPE, self.shape, self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_length_mismatch() {
        assert!(DenseTensor::new(vec![2, 3], vec![0.0; 5]).is_err());
        assert!(DenseTensor::new(vec![2, 3], vec![0.0; 6]).is_ok());
    }

    #[test]
    fn test_scalar_has_one_element() {
        let scalar = DenseTensor::new(vec![], vec![7.5]).unwrap();
        assert_eq!(scalar.ndim(), 0);
        assert_eq!(scalar.len(), 1);
    }

    #[test]
    fn test_bytes_are_little_endian() {
        let tensor = DenseTensor::new(vec![1], vec![1.0]).unwrap();
        assert_eq!(tensor.to_bytes(), vec![0x00, 0x00, 0x80, 0x3f]);

        let decoded = DenseTensor::from_bytes(vec![1], &[0x00, 0x00, 0x80, 0x3f]).unwrap();
        assert_eq!(decoded, tensor);
    }

    #[test]
    fn test_from_bytes_rejects_ragged_buffer() {
        assert!(DenseTensor::from_bytes(vec![1], &[0, 0, 0]).is_err());
        assert!(DenseTensor::from_bytes(vec![2], &[0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_overflowing_shape_is_rejected() {
        assert!(DenseTensor::new(vec![usize::MAX, 2], vec![]).is_err());
        assert!(DenseTensor::zeros(vec![usize::MAX, 2]).is_err());
        assert_eq!(DenseTensor::zeros(vec![2, 3]).unwrap().len(), 6);
    }
}
