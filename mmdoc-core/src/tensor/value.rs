//! Type-erased tensor variants stored in documents

use ndarray::ArrayD;
use tracing::trace;

use super::dense::DenseTensor;
use super::modality::ModalityKind;
use crate::backend::{Backend, BackendKind, BackendTensor};
use crate::error::{Error, Result};
use crate::registry::{self, VariantType};

/// A validated tensor whose variant type is known at runtime
#[derive(Debug, Clone)]
pub struct TensorValue {
    variant: VariantType,
    tensor: BackendTensor,
}

impl TensorValue {
    /// Validate a native tensor as the given modality
    pub fn new(modality: ModalityKind, tensor: BackendTensor) -> Result<Self> {
        let variant = registry::select(modality, tensor.kind())?;
        modality.validate_shape(&tensor.shape())?;
        Ok(Self { variant, tensor })
    }

    /// Build a value on `backend` from backend-neutral data
    pub fn from_dense(modality: ModalityKind, backend: BackendKind, dense: DenseTensor) -> Result<Self> {
        let variant = registry::select(modality, backend)?;
        modality.validate_shape(dense.shape())?;
        let tensor = BackendTensor::from_dense(backend, dense)?;
        Ok(Self { variant, tensor })
    }

    /// Assemble a value that has already been validated
    pub(crate) fn from_parts(variant: VariantType, tensor: BackendTensor) -> Self {
        Self { variant, tensor }
    }

    /// Get the concrete variant type
    pub fn variant(&self) -> VariantType {
        self.variant
    }

    /// Get the modality
    pub fn modality(&self) -> ModalityKind {
        self.variant.modality()
    }

    /// Get the backend
    pub fn backend(&self) -> BackendKind {
        self.variant.backend()
    }

    /// Get the shape
    pub fn shape(&self) -> Vec<usize> {
        self.tensor.shape()
    }

    /// Borrow the native tensor
    pub fn tensor(&self) -> &BackendTensor {
        &self.tensor
    }

    /// Unwrap the native tensor
    pub fn into_tensor(self) -> BackendTensor {
        self.tensor
    }

    /// Copy the values into backend-neutral form
    pub fn to_dense(&self) -> Result<DenseTensor> {
        self.tensor.to_dense()
    }

    /// Borrow the native tensor of backend `B`
    pub fn downcast_ref<B: Backend>(&self) -> Option<&B::Tensor> {
        B::downcast_ref(&self.tensor)
    }

    /// Borrow the `ndarray` array if this value lives on that backend
    pub fn as_ndarray(&self) -> Option<&ArrayD<f32>> {
        match &self.tensor {
            BackendTensor::NdArray(t) => Some(t),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Borrow the candle tensor if this value lives on that backend
    #[cfg(feature = "candle")]
    pub fn as_candle(&self) -> Option<&candle_core::Tensor> {
        match &self.tensor {
            BackendTensor::Candle(t) => Some(t),
            _ => None,
        }
    }

    /// Borrow the torch tensor if this value lives on that backend
    #[cfg(feature = "torch")]
    pub fn as_torch(&self) -> Option<&tch::Tensor> {
        match &self.tensor {
            BackendTensor::Torch(t) => Some(t),
            _ => None,
        }
    }

    /// Turn this value into the variant declared by a field
    ///
    /// `backend: None` keeps the current backend (backend-union fields).
    /// A different backend converts the values; a different modality
    /// re-validates the shape.
    pub fn coerce(self, modality: ModalityKind, backend: Option<BackendKind>) -> Result<Self> {
        let target_backend = backend.unwrap_or(self.variant.backend());
        let target = registry::select(modality, target_backend)?;
        if target == self.variant {
            return Ok(self);
        }

        modality.validate_shape(&self.tensor.shape())?;
        trace!(from = %self.variant, to = %target, "coercing tensor variant");
        let tensor = self.tensor.convert(target_backend)?;
        Ok(Self { variant: target, tensor })
    }
}

impl PartialEq for TensorValue {
    fn eq(&self, other: &Self) -> bool {
        if self.variant != other.variant {
            return false;
        }
        match (self.to_dense(), other.to_dense()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl TryFrom<ArrayD<f32>> for TensorValue {
    type Error = Error;

    fn try_from(array: ArrayD<f32>) -> Result<Self> {
        TensorValue::new(ModalityKind::Generic, BackendTensor::NdArray(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_generic_from_array() {
        let value = TensorValue::try_from(ArrayD::<f32>::zeros(IxDyn(&[3, 224, 224]))).unwrap();
        assert_eq!(value.modality(), ModalityKind::Generic);
        assert_eq!(value.backend(), BackendKind::NdArray);
        assert_eq!(value.shape(), vec![3, 224, 224]);
    }

    #[test]
    fn test_new_validates_modality() {
        let tensor = BackendTensor::NdArray(ArrayD::zeros(IxDyn(&[2, 3, 4])));
        let err = TensorValue::new(ModalityKind::Embedding, tensor).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_coerce_retags_modality() {
        let value = TensorValue::try_from(ArrayD::<f32>::zeros(IxDyn(&[100, 1]))).unwrap();
        let embedding = value.coerce(ModalityKind::Embedding, None).unwrap();
        assert_eq!(embedding.variant().name(), "NdArrayEmbedding");

        let err = embedding.coerce(ModalityKind::Video, None).unwrap_err();
        assert!(err.is_validation());
    }

    #[cfg(not(feature = "candle"))]
    #[test]
    fn test_coerce_to_unavailable_backend_fails_closed() {
        let value = TensorValue::try_from(ArrayD::<f32>::zeros(IxDyn(&[4]))).unwrap();
        assert!(matches!(
            value.coerce(ModalityKind::Generic, Some(BackendKind::Candle)),
            Err(Error::UnsupportedBackend { .. })
        ));
    }

    #[test]
    fn test_equality_compares_values() {
        let dense = DenseTensor::new(vec![2], vec![1.0, 2.0]).unwrap();
        let a = TensorValue::from_dense(ModalityKind::Audio, BackendKind::NdArray, dense.clone()).unwrap();
        let b = TensorValue::from_dense(ModalityKind::Audio, BackendKind::NdArray, dense.clone()).unwrap();
        let c = TensorValue::from_dense(ModalityKind::Embedding, BackendKind::NdArray, dense).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[cfg(feature = "torch")]
    #[test]
    fn test_coerce_across_backends() {
        let value = TensorValue::try_from(ArrayD::<f32>::ones(IxDyn(&[2, 2]))).unwrap();
        let torch = value.coerce(ModalityKind::Image, Some(BackendKind::Torch)).unwrap();
        assert_eq!(torch.variant().name(), "ImageTorchTensor");
        assert!(torch.as_torch().is_some());
        assert_eq!(torch.to_dense().unwrap().data(), &[1.0; 4]);
    }
}
