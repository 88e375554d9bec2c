//! Modality-specific tensor variants
//!
//! - [`Variant`] is the statically typed wrapper, parametrized by a modality
//!   marker and a backend marker (`ImageTensor<NdArray>`, ...).
//! - [`TensorValue`] is the type-erased form stored in documents.
//! - [`DenseTensor`] is the backend-neutral payload used for conversion and
//!   for the wire format.

mod dense;
mod modality;
mod value;
mod variant;

pub use dense::{DenseTensor, DENSE_DTYPE};
pub use modality::{image_layout, Audio, ChannelLayout, Embedding, Generic, Image, Modality, ModalityKind, Video};
pub use value::TensorValue;
pub use variant::{
    AnyTensor, AudioNdArray, AudioTensor, EmbeddingTensor, ImageNdArray, ImageTensor, NdArrayEmbedding,
    NdArrayTensor, Variant, VideoNdArray, VideoTensor,
};

#[cfg(feature = "candle")]
pub use variant::{AudioCandleTensor, CandleEmbedding, CandleTensor, ImageCandleTensor, VideoCandleTensor};

#[cfg(feature = "torch")]
pub use variant::{AudioTorchTensor, ImageTorchTensor, TorchEmbedding, TorchTensor, VideoTorchTensor};
