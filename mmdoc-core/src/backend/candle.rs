//! `candle-core` backend

use ::candle_core::{DType, Device, Tensor};

use super::{Backend, BackendKind, BackendTensor};
use crate::error::{Error, Result};
use crate::tensor::DenseTensor;

/// Marker for the `candle-core` backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Candle;

fn backend_error(err: ::candle_core::Error) -> Error {
    Error::Backend(format!("candle: {err}"))
}

impl Backend for Candle {
    type Tensor = Tensor;

    const KIND: BackendKind = BackendKind::Candle;

    fn shape(tensor: &Self::Tensor) -> Vec<usize> {
        tensor.dims().to_vec()
    }

    fn to_dense(tensor: &Self::Tensor) -> Result<DenseTensor> {
        let data = tensor
            .to_dtype(DType::F32)
            .and_then(|t| t.flatten_all())
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(backend_error)?;
        DenseTensor::new(tensor.dims().to_vec(), data)
    }

    fn from_dense(dense: DenseTensor) -> Result<Self::Tensor> {
        let (shape, data) = dense.into_parts();
        Tensor::from_vec(data, shape, &Device::Cpu).map_err(backend_error)
    }

    fn duplicate(tensor: &Self::Tensor) -> Self::Tensor {
        tensor.clone()
    }

    fn erase(tensor: Self::Tensor) -> BackendTensor {
        BackendTensor::Candle(tensor)
    }

    fn downcast(tensor: BackendTensor) -> std::result::Result<Self::Tensor, BackendTensor> {
        match tensor {
            BackendTensor::Candle(t) => Ok(t),
            other => Err(other),
        }
    }

    fn downcast_ref(tensor: &BackendTensor) -> Option<&Self::Tensor> {
        match tensor {
            BackendTensor::Candle(t) => Some(t),
            _ => None,
        }
    }
}

pub(super) fn probe() -> bool {
    Tensor::zeros(1, DType::F32, &Device::Cpu).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_roundtrip() {
        let dense = DenseTensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let tensor = Candle::from_dense(dense.clone()).unwrap();
        assert_eq!(Candle::shape(&tensor), vec![2, 3]);
        assert_eq!(Candle::to_dense(&tensor).unwrap(), dense);
    }

    #[test]
    fn test_to_dense_casts_dtype() {
        let tensor = Tensor::zeros((2, 2), DType::F64, &Device::Cpu).unwrap();
        let dense = Candle::to_dense(&tensor).unwrap();
        assert_eq!(dense.data(), &[0.0; 4]);
    }
}
