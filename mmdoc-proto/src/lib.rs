//! Protobuf wire format for mmdoc documents
//!
//! [`to_wire`] encodes a document into a `DocumentProto` message and
//! [`from_wire`] rebuilds it from the bytes and the document schema,
//! restoring each field's declared tensor variant. [`from_wire_inferred`]
//! decodes without a schema.
//!
//! The message definitions are documented in `proto/mmdoc.proto`.

#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod error;
pub mod infer;
pub mod message;

// Re-export key types for convenience
pub use codec::{from_proto, from_wire, to_proto, to_wire, Codec};
pub use config::CodecConfig;
pub use error::{Error, Result};
pub use infer::{from_wire_inferred, ANY_DOCUMENT};
pub use message::{DocumentProto, NodeProto};
