//! Numerical tensor backends
//!
//! Each backend is a zero-sized marker type implementing [`Backend`]. The
//! marker names the native tensor type and knows how to move it in and out
//! of the backend-neutral [`DenseTensor`] form used by the wire codec.
//!
//! The array backend ([`NdArray`]) is always compiled. The deep-learning
//! framework backends are behind cargo features:
//!
//! - `candle`: [`Candle`], backed by `candle_core::Tensor`
//! - `torch`: [`Torch`], backed by `tch::Tensor`
//!
//! Whether a compiled backend is actually usable is decided once per process
//! by [`is_backend_available`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tensor::DenseTensor;

mod ndarray;
mod probe;

#[cfg(feature = "candle")]
mod candle;

#[cfg(feature = "torch")]
mod torch;

pub use self::ndarray::NdArray;
pub use probe::{is_backend_available, is_backend_available_by_name};

#[cfg(feature = "candle")]
pub use self::candle::Candle;

#[cfg(feature = "torch")]
pub use self::torch::Torch;

/// The numerical libraries a tensor variant can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BackendKind {
    /// `ndarray` n-dimensional arrays
    NdArray,

    /// `candle-core` tensors
    Candle,

    /// `tch` (libtorch) tensors
    Torch,
}

impl BackendKind {
    /// Every backend kind, in registry order
    pub const ALL: [BackendKind; 3] = [BackendKind::NdArray, BackendKind::Candle, BackendKind::Torch];

    /// Position of this kind in [`BackendKind::ALL`]
    pub(crate) fn index(self) -> usize {
        match self {
            BackendKind::NdArray => 0,
            BackendKind::Candle => 1,
            BackendKind::Torch => 2,
        }
    }

    /// Canonical lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::NdArray => "ndarray",
            BackendKind::Candle => "candle",
            BackendKind::Torch => "torch",
        }
    }

    /// Check whether support for this backend was compiled into the crate
    pub fn is_compiled(self) -> bool {
        match self {
            BackendKind::NdArray => true,
            BackendKind::Candle => cfg!(feature = "candle"),
            BackendKind::Torch => cfg!(feature = "torch"),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ndarray" | "numpy" => Ok(BackendKind::NdArray),
            "candle" => Ok(BackendKind::Candle),
            "torch" | "tch" | "pytorch" => Ok(BackendKind::Torch),
            other => Err(Error::Backend(format!("unknown backend name '{other}'"))),
        }
    }
}

/// A numerical library that can own tensor data
///
/// Implementations only describe how to inspect and convert the native
/// tensor type; all math stays in the backend library itself.
pub trait Backend: Send + Sync + 'static {
    /// The backend's native tensor type
    type Tensor: fmt::Debug + Send;

    /// Which [`BackendKind`] this backend is
    const KIND: BackendKind;

    /// Shape of a native tensor
    fn shape(tensor: &Self::Tensor) -> Vec<usize>;

    /// Copy a native tensor into row-major `f32` form
    fn to_dense(tensor: &Self::Tensor) -> Result<DenseTensor>;

    /// Build a native tensor from row-major `f32` data
    fn from_dense(dense: DenseTensor) -> Result<Self::Tensor>;

    /// Duplicate a native tensor for a cloned value
    ///
    /// Backends with in-place operations return a deep copy.
    fn duplicate(tensor: &Self::Tensor) -> Self::Tensor;

    /// Erase the backend type
    fn erase(tensor: Self::Tensor) -> BackendTensor;

    /// Recover the native tensor, handing the input back on a backend mismatch
    fn downcast(tensor: BackendTensor) -> std::result::Result<Self::Tensor, BackendTensor>;

    /// Borrow the native tensor if it belongs to this backend
    fn downcast_ref(tensor: &BackendTensor) -> Option<&Self::Tensor>;
}

/// A native tensor from any compiled backend
#[derive(Debug)]
pub enum BackendTensor {
    /// `ndarray` array
    NdArray(::ndarray::ArrayD<f32>),

    /// `candle-core` tensor
    #[cfg(feature = "candle")]
    Candle(::candle_core::Tensor),

    /// `tch` tensor
    #[cfg(feature = "torch")]
    Torch(::tch::Tensor),
}

impl BackendTensor {
    /// Build a native tensor for `kind` from dense data
    pub fn from_dense(kind: BackendKind, dense: DenseTensor) -> Result<Self> {
        match kind {
            BackendKind::NdArray => NdArray::from_dense(dense).map(BackendTensor::NdArray),
            #[cfg(feature = "candle")]
            BackendKind::Candle => Candle::from_dense(dense).map(BackendTensor::Candle),
            #[cfg(feature = "torch")]
            BackendKind::Torch => Torch::from_dense(dense).map(BackendTensor::Torch),
            #[allow(unreachable_patterns)]
            other => Err(Error::Backend(format!("backend '{other}' is not compiled in"))),
        }
    }

    /// The backend this tensor belongs to
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendTensor::NdArray(_) => BackendKind::NdArray,
            #[cfg(feature = "candle")]
            BackendTensor::Candle(_) => BackendKind::Candle,
            #[cfg(feature = "torch")]
            BackendTensor::Torch(_) => BackendKind::Torch,
        }
    }

    /// Shape of the tensor
    pub fn shape(&self) -> Vec<usize> {
        match self {
            BackendTensor::NdArray(t) => NdArray::shape(t),
            #[cfg(feature = "candle")]
            BackendTensor::Candle(t) => Candle::shape(t),
            #[cfg(feature = "torch")]
            BackendTensor::Torch(t) => Torch::shape(t),
        }
    }

    /// Copy the tensor into row-major `f32` form
    pub fn to_dense(&self) -> Result<DenseTensor> {
        match self {
            BackendTensor::NdArray(t) => NdArray::to_dense(t),
            #[cfg(feature = "candle")]
            BackendTensor::Candle(t) => Candle::to_dense(t),
            #[cfg(feature = "torch")]
            BackendTensor::Torch(t) => Torch::to_dense(t),
        }
    }

    /// Move the values into another backend
    pub fn convert(self, target: BackendKind) -> Result<Self> {
        if self.kind() == target {
            return Ok(self);
        }
        let dense = self.to_dense()?;
        BackendTensor::from_dense(target, dense)
    }
}

impl Clone for BackendTensor {
    fn clone(&self) -> Self {
        match self {
            BackendTensor::NdArray(t) => BackendTensor::NdArray(NdArray::duplicate(t)),
            #[cfg(feature = "candle")]
            BackendTensor::Candle(t) => BackendTensor::Candle(Candle::duplicate(t)),
            #[cfg(feature = "torch")]
            BackendTensor::Torch(t) => BackendTensor::Torch(Torch::duplicate(t)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("ndarray", BackendKind::NdArray)]
    #[test_case("numpy", BackendKind::NdArray)]
    #[test_case("Candle", BackendKind::Candle)]
    #[test_case("tch", BackendKind::Torch)]
    #[test_case(" torch ", BackendKind::Torch)]
    fn test_parse_backend_name(name: &str, expected: BackendKind) {
        assert_eq!(name.parse::<BackendKind>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_backend_name() {
        assert!("tensorflow".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_ndarray_always_compiled() {
        assert!(BackendKind::NdArray.is_compiled());
        assert_eq!(BackendKind::Candle.is_compiled(), cfg!(feature = "candle"));
        assert_eq!(BackendKind::Torch.is_compiled(), cfg!(feature = "torch"));
    }

    #[test]
    fn test_convert_to_same_backend_is_identity() {
        let dense = DenseTensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let tensor = BackendTensor::from_dense(BackendKind::NdArray, dense.clone()).unwrap();
        let converted = tensor.convert(BackendKind::NdArray).unwrap();
        assert_eq!(converted.kind(), BackendKind::NdArray);
        assert_eq!(converted.to_dense().unwrap(), dense);
    }

    #[cfg(not(feature = "candle"))]
    #[test]
    fn test_convert_to_missing_backend_fails() {
        let tensor = BackendTensor::from_dense(BackendKind::NdArray, DenseTensor::zeros(vec![3]).unwrap()).unwrap();
        assert!(matches!(tensor.convert(BackendKind::Candle), Err(Error::Backend(_))));
    }
}
