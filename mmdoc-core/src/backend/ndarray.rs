//! `ndarray` backend

use ::ndarray::{ArrayD, IxDyn};

use super::{Backend, BackendKind, BackendTensor};
use crate::error::{Error, Result};
use crate::tensor::DenseTensor;

/// Marker for the `ndarray` backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NdArray;

impl Backend for NdArray {
    type Tensor = ArrayD<f32>;

    const KIND: BackendKind = BackendKind::NdArray;

    fn shape(tensor: &Self::Tensor) -> Vec<usize> {
        tensor.shape().to_vec()
    }

    fn to_dense(tensor: &Self::Tensor) -> Result<DenseTensor> {
        // iter() walks in logical row-major order regardless of memory layout
        DenseTensor::new(tensor.shape().to_vec(), tensor.iter().copied().collect())
    }

    fn from_dense(dense: DenseTensor) -> Result<Self::Tensor> {
        let (shape, data) = dense.into_parts();
        ArrayD::from_shape_vec(IxDyn(&shape), data)
            .map_err(|e| Error::Backend(format!("ndarray: {e}")))
    }

    fn duplicate(tensor: &Self::Tensor) -> Self::Tensor {
        tensor.clone()
    }

    fn erase(tensor: Self::Tensor) -> BackendTensor {
        BackendTensor::NdArray(tensor)
    }

    fn downcast(tensor: BackendTensor) -> std::result::Result<Self::Tensor, BackendTensor> {
        match tensor {
            BackendTensor::NdArray(t) => Ok(t),
            #[allow(unreachable_patterns)]
            other => Err(other),
        }
    }

    fn downcast_ref(tensor: &BackendTensor) -> Option<&Self::Tensor> {
        match tensor {
            BackendTensor::NdArray(t) => Some(t),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

pub(super) fn probe() -> bool {
    ArrayD::<f32>::zeros(IxDyn(&[1])).len() == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::ndarray::Array2;

    #[test]
    fn test_dense_roundtrip_keeps_logical_order() {
        // transposed view has non-standard strides
        let array = Array2::from_shape_vec((2, 3), vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap()
            .reversed_axes()
            .into_dyn();

        let dense = NdArray::to_dense(&array).unwrap();
        assert_eq!(dense.shape(), &[3, 2]);
        assert_eq!(dense.data(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

        let rebuilt = NdArray::from_dense(dense).unwrap();
        assert_eq!(rebuilt, array);
    }

    #[test]
    fn test_downcast_ref() {
        let erased = NdArray::erase(ArrayD::zeros(IxDyn(&[2])));
        assert!(NdArray::downcast_ref(&erased).is_some());
        assert!(NdArray::downcast(erased).is_ok());
    }
}
