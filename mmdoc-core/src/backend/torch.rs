//! `tch` (libtorch) backend

use ::tch::{Kind, Tensor};

use super::{Backend, BackendKind, BackendTensor};
use crate::error::{Error, Result};
use crate::tensor::DenseTensor;

/// Marker for the `tch` backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Torch;

fn backend_error(err: ::tch::TchError) -> Error {
    Error::Backend(format!("torch: {err}"))
}

fn dims_to_usize(size: &[i64]) -> Result<Vec<usize>> {
    size.iter()
        .map(|&d| usize::try_from(d).map_err(|_| Error::Backend(format!("torch: invalid dimension {d}"))))
        .collect()
}

fn dims_to_i64(shape: &[usize]) -> Result<Vec<i64>> {
    shape
        .iter()
        .map(|&d| i64::try_from(d).map_err(|_| Error::Backend(format!("torch: dimension {d} overflows i64"))))
        .collect()
}

impl Backend for Torch {
    type Tensor = Tensor;

    const KIND: BackendKind = BackendKind::Torch;

    fn shape(tensor: &Self::Tensor) -> Vec<usize> {
        // libtorch rejects negative sizes when a tensor is created
        dims_to_usize(&tensor.size()).unwrap_or_default()
    }

    fn to_dense(tensor: &Self::Tensor) -> Result<DenseTensor> {
        let shape = dims_to_usize(&tensor.size())?;
        let flat = tensor.to_kind(Kind::Float).flatten(0, -1).contiguous();
        let data = Vec::<f32>::try_from(&flat).map_err(backend_error)?;
        DenseTensor::new(shape, data)
    }

    fn from_dense(dense: DenseTensor) -> Result<Self::Tensor> {
        let dims = dims_to_i64(dense.shape())?;
        Tensor::f_from_data_size(&dense.to_bytes(), &dims, Kind::Float).map_err(backend_error)
    }

    fn duplicate(tensor: &Self::Tensor) -> Self::Tensor {
        tensor.copy()
    }

    fn erase(tensor: Self::Tensor) -> BackendTensor {
        BackendTensor::Torch(tensor)
    }

    fn downcast(tensor: BackendTensor) -> std::result::Result<Self::Tensor, BackendTensor> {
        match tensor {
            BackendTensor::Torch(t) => Ok(t),
            other => Err(other),
        }
    }

    fn downcast_ref(tensor: &BackendTensor) -> Option<&Self::Tensor> {
        match tensor {
            BackendTensor::Torch(t) => Some(t),
            _ => None,
        }
    }
}

pub(super) fn probe() -> bool {
    // libtorch reports load failures by panicking; the caller catches unwinds
    Tensor::f_from_data_size(&[0u8; 4], &[1], Kind::Float).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_roundtrip() {
        let dense = DenseTensor::new(vec![3, 1], vec![1.0, 2.0, 3.0]).unwrap();
        let tensor = Torch::from_dense(dense.clone()).unwrap();
        assert_eq!(Torch::shape(&tensor), vec![3, 1]);
        assert_eq!(Torch::to_dense(&tensor).unwrap(), dense);
    }

    #[test]
    fn test_duplicate_owns_storage() {
        let dense = DenseTensor::new(vec![2], vec![1.0, 2.0]).unwrap();
        let tensor = Torch::from_dense(dense.clone()).unwrap();

        let mut copy = Torch::duplicate(&tensor);
        let _ = copy.fill_(7.0);
        assert_eq!(Torch::to_dense(&tensor).unwrap(), dense);
        assert_eq!(Torch::to_dense(&copy).unwrap().data(), &[7.0, 7.0]);
    }

    #[test]
    fn test_negative_dimension_is_an_error() {
        assert!(matches!(dims_to_usize(&[2, -1]), Err(Error::Backend(_))));
        assert_eq!(dims_to_usize(&[2, 3]).unwrap(), vec![2, 3]);
    }
}
