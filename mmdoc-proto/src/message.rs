//! Protobuf messages
//!
//! Hand-maintained `prost` definitions matching `proto/mmdoc.proto`. Maps
//! use `BTreeMap` so encoding is deterministic.

use std::collections::BTreeMap;

use prost::Message;

/// A document: its id and one node per present field
#[derive(Clone, PartialEq, Message)]
pub struct DocumentProto {
    /// Document id
    #[prost(string, tag = "1")]
    pub id: String,

    /// Field name to value
    #[prost(btree_map = "string, message", tag = "2")]
    pub data: BTreeMap<String, NodeProto>,
}

/// One field value
#[derive(Clone, PartialEq, Message)]
pub struct NodeProto {
    /// The value, tagged by kind
    #[prost(
        oneof = "node_proto::Content",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19"
    )]
    pub content: Option<node_proto::Content>,
}

/// Nested types of [`NodeProto`]
pub mod node_proto {
    use prost::Oneof;

    /// Field value by kind; tensors are tagged by the backend that produced them
    #[derive(Clone, PartialEq, Oneof)]
    pub enum Content {
        /// Text
        #[prost(string, tag = "1")]
        Text(String),
        /// Raw bytes
        #[prost(bytes = "vec", tag = "2")]
        Blob(Vec<u8>),
        /// Integer
        #[prost(int64, tag = "3")]
        Integer(i64),
        /// Float
        #[prost(double, tag = "4")]
        Float(f64),
        /// Boolean
        #[prost(bool, tag = "5")]
        Boolean(bool),
        /// `ndarray` tensor
        #[prost(message, tag = "6")]
        Ndarray(super::NdArrayProto),
        /// Candle tensor
        #[prost(message, tag = "7")]
        CandleTensor(super::NdArrayProto),
        /// Torch tensor
        #[prost(message, tag = "8")]
        TorchTensor(super::NdArrayProto),
        /// Untyped URL
        #[prost(string, tag = "9")]
        AnyUrl(String),
        /// Image URL
        #[prost(string, tag = "10")]
        ImageUrl(String),
        /// Text URL
        #[prost(string, tag = "11")]
        TextUrl(String),
        /// Audio URL
        #[prost(string, tag = "12")]
        AudioUrl(String),
        /// Video URL
        #[prost(string, tag = "13")]
        VideoUrl(String),
        /// 3D mesh URL
        #[prost(string, tag = "14")]
        Mesh3dUrl(String),
        /// 3D point cloud URL
        #[prost(string, tag = "15")]
        PointCloud3dUrl(String),
        /// Nested document
        #[prost(message, tag = "16")]
        Document(super::DocumentProto),
        /// Nested document collection
        #[prost(message, tag = "17")]
        DocumentArray(super::DocumentArrayProto),
        /// Free-form mapping
        #[prost(message, tag = "18")]
        Dict(super::StructProto),
        /// Numeric scores
        #[prost(message, tag = "19")]
        Scores(super::ScoresProto),
    }
}

/// A collection of documents
#[derive(Clone, PartialEq, Message)]
pub struct DocumentArrayProto {
    /// Documents in order
    #[prost(message, repeated, tag = "1")]
    pub docs: Vec<DocumentProto>,
}

/// A tensor payload
#[derive(Clone, PartialEq, Message)]
pub struct NdArrayProto {
    /// Dense values
    #[prost(message, optional, tag = "1")]
    pub dense: Option<DenseNdArrayProto>,

    /// Modality the tensor was validated as; informational on typed decode
    #[prost(string, tag = "2")]
    pub modality: String,
}

/// Dense row-major tensor data
#[derive(Clone, PartialEq, Message)]
pub struct DenseNdArrayProto {
    /// Little-endian element bytes
    #[prost(bytes = "vec", tag = "1")]
    pub buffer: Vec<u8>,

    /// Dimensions
    #[prost(uint32, repeated, tag = "2")]
    pub shape: Vec<u32>,

    /// Element type name
    #[prost(string, tag = "3")]
    pub dtype: String,
}

/// A JSON-like object
#[derive(Clone, PartialEq, Message)]
pub struct StructProto {
    /// Members by key
    #[prost(btree_map = "string, message", tag = "1")]
    pub fields: BTreeMap<String, ValueProto>,
}

/// A JSON-like value
#[derive(Clone, PartialEq, Message)]
pub struct ValueProto {
    /// The value, tagged by kind
    #[prost(oneof = "value_proto::Kind", tags = "1, 2, 3, 4, 5, 6, 7, 8")]
    pub kind: Option<value_proto::Kind>,
}

/// Nested types of [`ValueProto`]
pub mod value_proto {
    use prost::Oneof;

    /// JSON value by kind
    #[derive(Clone, PartialEq, Oneof)]
    pub enum Kind {
        /// Null
        #[prost(bool, tag = "1")]
        NullValue(bool),
        /// Non-integral number
        #[prost(double, tag = "2")]
        NumberValue(f64),
        /// String
        #[prost(string, tag = "3")]
        StringValue(String),
        /// Boolean
        #[prost(bool, tag = "4")]
        BoolValue(bool),
        /// Object
        #[prost(message, tag = "5")]
        StructValue(super::StructProto),
        /// Array
        #[prost(message, tag = "6")]
        ListValue(super::ListValueProto),
        /// Integer, kept exact
        #[prost(int64, tag = "7")]
        IntegerValue(i64),
        /// Integer above the signed range, kept exact
        #[prost(uint64, tag = "8")]
        UnsignedValue(u64),
    }
}

/// A JSON-like array
#[derive(Clone, PartialEq, Message)]
pub struct ListValueProto {
    /// Items in order
    #[prost(message, repeated, tag = "1")]
    pub values: Vec<ValueProto>,
}

/// Named scores
#[derive(Clone, PartialEq, Message)]
pub struct ScoresProto {
    /// Score by name
    #[prost(btree_map = "string, double", tag = "1")]
    pub values: BTreeMap<String, f64>,
}
