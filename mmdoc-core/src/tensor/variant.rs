//! Statically typed tensor variants

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

use super::dense::DenseTensor;
use super::modality::{image_layout, Audio, ChannelLayout, Embedding, Generic, Image, Modality, Video};
use super::value::TensorValue;
use crate::backend::{Backend, NdArray};
use crate::error::Result;
use crate::registry::{self, VariantType};

#[cfg(feature = "candle")]
use crate::backend::Candle;
#[cfg(feature = "torch")]
use crate::backend::Torch;

/// A backend tensor that satisfies the shape rule of modality `M`
///
/// `Variant<Image, NdArray>` plays the role of `ImageTensor[NdArray]`: the
/// modality and backend are fixed by the type, construction validates the
/// shape, and the wrapper dereferences to the backend's native tensor so
/// backend operations are used directly.
pub struct Variant<M: Modality, B: Backend> {
    tensor: B::Tensor,
    _modality: PhantomData<M>,
}

/// Tensor with no modality rule
pub type AnyTensor<B> = Variant<Generic, B>;

/// Image tensor
pub type ImageTensor<B> = Variant<Image, B>;

/// Audio tensor
pub type AudioTensor<B> = Variant<Audio, B>;

/// Video tensor
pub type VideoTensor<B> = Variant<Video, B>;

/// Embedding tensor
pub type EmbeddingTensor<B> = Variant<Embedding, B>;

/// Generic `ndarray` tensor
pub type NdArrayTensor = AnyTensor<NdArray>;
/// `ndarray` image
pub type ImageNdArray = ImageTensor<NdArray>;
/// `ndarray` audio
pub type AudioNdArray = AudioTensor<NdArray>;
/// `ndarray` video
pub type VideoNdArray = VideoTensor<NdArray>;
/// `ndarray` embedding
pub type NdArrayEmbedding = EmbeddingTensor<NdArray>;

/// Generic candle tensor
#[cfg(feature = "candle")]
pub type CandleTensor = AnyTensor<Candle>;
/// Candle image
#[cfg(feature = "candle")]
pub type ImageCandleTensor = ImageTensor<Candle>;
/// Candle audio
#[cfg(feature = "candle")]
pub type AudioCandleTensor = AudioTensor<Candle>;
/// Candle video
#[cfg(feature = "candle")]
pub type VideoCandleTensor = VideoTensor<Candle>;
/// Candle embedding
#[cfg(feature = "candle")]
pub type CandleEmbedding = EmbeddingTensor<Candle>;

/// Generic torch tensor
#[cfg(feature = "torch")]
pub type TorchTensor = AnyTensor<Torch>;
/// Torch image
#[cfg(feature = "torch")]
pub type ImageTorchTensor = ImageTensor<Torch>;
/// Torch audio
#[cfg(feature = "torch")]
pub type AudioTorchTensor = AudioTensor<Torch>;
/// Torch video
#[cfg(feature = "torch")]
pub type VideoTorchTensor = VideoTensor<Torch>;
/// Torch embedding
#[cfg(feature = "torch")]
pub type TorchEmbedding = EmbeddingTensor<Torch>;

impl<M: Modality, B: Backend> Variant<M, B> {
    /// Wrap a native tensor after checking the backend and shape rule
    pub fn new(tensor: B::Tensor) -> Result<Self> {
        registry::select(M::KIND, B::KIND)?;
        M::KIND.validate_shape(&B::shape(&tensor))?;
        Ok(Self {
            tensor,
            _modality: PhantomData,
        })
    }

    /// Build the variant from backend-neutral data
    pub fn from_dense(dense: DenseTensor) -> Result<Self> {
        registry::select(M::KIND, B::KIND)?;
        M::KIND.validate_shape(dense.shape())?;
        Ok(Self {
            tensor: B::from_dense(dense)?,
            _modality: PhantomData,
        })
    }

    /// Decode the variant from little-endian `f32` bytes
    pub fn from_bytes(shape: Vec<usize>, bytes: &[u8]) -> Result<Self> {
        Self::from_dense(DenseTensor::from_bytes(shape, bytes)?)
    }

    /// Create a zero-filled variant
    pub fn zeros(shape: &[usize]) -> Result<Self> {
        Self::from_dense(DenseTensor::zeros(shape.to_vec())?)
    }

    /// Recover a typed variant from a type-erased value
    ///
    /// Values from another backend are converted and values of another
    /// modality are re-validated against `M`.
    pub fn from_value(value: TensorValue) -> Result<Self> {
        let value = value.coerce(M::KIND, Some(B::KIND))?;
        match B::downcast(value.into_tensor()) {
            Ok(tensor) => Ok(Self {
                tensor,
                _modality: PhantomData,
            }),
            Err(other) => Self::from_dense(other.to_dense()?),
        }
    }

    /// The variant type of this wrapper
    pub fn variant_type() -> VariantType {
        VariantType::new(M::KIND, B::KIND)
    }

    /// Get the shape of the tensor
    pub fn shape(&self) -> Vec<usize> {
        B::shape(&self.tensor)
    }

    /// Get the number of dimensions
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Copy the values into backend-neutral form
    pub fn to_dense(&self) -> Result<DenseTensor> {
        B::to_dense(&self.tensor)
    }

    /// Encode the values as little-endian `f32` bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.to_dense()?.to_bytes())
    }

    /// Unwrap the native tensor
    pub fn into_inner(self) -> B::Tensor {
        self.tensor
    }

    /// Erase the static types
    pub fn into_value(self) -> TensorValue {
        TensorValue::from_parts(Self::variant_type(), B::erase(self.tensor))
    }
}

impl<B: Backend> Variant<Image, B> {
    /// Where the channel axis sits
    pub fn channel_layout(&self) -> ChannelLayout {
        image_layout(&self.shape()).unwrap_or(ChannelLayout::Grayscale)
    }

    /// Number of color channels
    pub fn channels(&self) -> usize {
        let shape = self.shape();
        match self.channel_layout() {
            ChannelLayout::Grayscale => 1,
            ChannelLayout::ChannelsLast => shape[2],
            ChannelLayout::ChannelsFirst => shape[0],
        }
    }
}

impl<B: Backend> Variant<Audio, B> {
    /// Number of audio channels
    pub fn channels(&self) -> usize {
        let shape = self.shape();
        if shape.len() == 2 {
            shape[0]
        } else {
            1
        }
    }

    /// Number of samples per channel
    pub fn samples(&self) -> usize {
        self.shape().last().copied().unwrap_or(0)
    }
}

impl<B: Backend> Variant<Video, B> {
    /// Number of frames
    pub fn frames(&self) -> usize {
        let shape = self.shape();
        if shape.len() == 4 {
            shape[0]
        } else {
            1
        }
    }
}

impl<B: Backend> Variant<Embedding, B> {
    /// Size of each embedding vector
    pub fn dim(&self) -> usize {
        self.shape().last().copied().unwrap_or(0)
    }
}

impl<M: Modality, B: Backend> Deref for Variant<M, B> {
    type Target = B::Tensor;

    fn deref(&self) -> &Self::Target {
        &self.tensor
    }
}

impl<M: Modality, B: Backend> Clone for Variant<M, B> {
    fn clone(&self) -> Self {
        Self {
            tensor: B::duplicate(&self.tensor),
            _modality: PhantomData,
        }
    }
}

impl<M: Modality, B: Backend> fmt::Debug for Variant<M, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(Self::variant_type().name())
            .field("tensor", &self.tensor)
            .finish()
    }
}

impl<M: Modality, B: Backend> From<Variant<M, B>> for TensorValue {
    fn from(variant: Variant<M, B>) -> Self {
        variant.into_value()
    }
}
