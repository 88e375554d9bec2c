//! Core types for multimodal documents
//!
//! This crate provides the data model for documents mixing text, URLs and
//! tensors of several modalities (image, audio, video, embedding) bound to
//! pluggable numerical backends. Tensor fields are declared per modality and
//! either fixed to one backend or left open to any backend available in the
//! process; values are validated and coerced on assignment.
//!
//! The wire format lives in the `mmdoc-proto` crate.

#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod document;
pub mod error;
pub mod legacy;
pub mod registry;
pub mod schema;
pub mod tensor;
pub mod url;

// Re-export key types for convenience
pub use backend::{is_backend_available, is_backend_available_by_name, Backend, BackendKind, BackendTensor, NdArray};
pub use config::ProbeConfig;
pub use document::{Document, DocumentArray, DocumentBuilder, FieldValue};
pub use error::{Error, Result};
pub use legacy::LegacyDocument;
pub use registry::{registered_backends, registered_variants, select, VariantType};
pub use schema::{DefaultValue, DocRef, DocumentSchema, Field, FieldType, TensorField};
pub use tensor::{DenseTensor, ModalityKind, TensorValue, Variant};
pub use url::{DocUrl, UrlKind};

#[cfg(feature = "candle")]
pub use backend::Candle;

#[cfg(feature = "torch")]
pub use backend::Torch;
