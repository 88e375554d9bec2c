//! Document encoding and schema-driven decoding
//!
//! Encoding writes one node per present field. Tensors are written as dense
//! little-endian `f32` payloads under the oneof tag of the backend that holds
//! them. Decoding is driven by the declared schema: a field fixed to one
//! backend is rebuilt on that backend whatever tag carried it, while a field
//! open to any backend is rebuilt on the tag's backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use mmdoc_core::schema::TensorField;
use mmdoc_core::tensor::DENSE_DTYPE;
use mmdoc_core::{
    BackendKind, DenseTensor, DocUrl, Document, DocumentArray, DocumentSchema, Field, FieldType, FieldValue,
    TensorValue, UrlKind,
};
use prost::Message;
use tracing::{debug, trace};

use crate::config::CodecConfig;
use crate::error::{Error, Result};
use crate::message::node_proto::Content;
use crate::message::value_proto::Kind;
use crate::message::{
    DenseNdArrayProto, DocumentArrayProto, DocumentProto, ListValueProto, NdArrayProto, NodeProto, ScoresProto,
    StructProto, ValueProto,
};

pub(crate) fn child_path(path: &str, name: &str) -> String {
    format!("{path}.{name}")
}

pub(crate) fn content_name(content: &Content) -> &'static str {
    match content {
        Content::Text(_) => "text",
        Content::Blob(_) => "blob",
        Content::Integer(_) => "integer",
        Content::Float(_) => "float",
        Content::Boolean(_) => "boolean",
        Content::Ndarray(_) => "ndarray",
        Content::CandleTensor(_) => "candle_tensor",
        Content::TorchTensor(_) => "torch_tensor",
        Content::AnyUrl(_) => "any_url",
        Content::ImageUrl(_) => "image_url",
        Content::TextUrl(_) => "text_url",
        Content::AudioUrl(_) => "audio_url",
        Content::VideoUrl(_) => "video_url",
        Content::Mesh3dUrl(_) => "mesh_url",
        Content::PointCloud3dUrl(_) => "point_cloud_url",
        Content::Document(_) => "document",
        Content::DocumentArray(_) => "document_array",
        Content::Dict(_) => "dict",
        Content::Scores(_) => "scores",
    }
}

fn url_content(kind: UrlKind, raw: String) -> Content {
    match kind {
        UrlKind::Any => Content::AnyUrl(raw),
        UrlKind::Image => Content::ImageUrl(raw),
        UrlKind::Text => Content::TextUrl(raw),
        UrlKind::Audio => Content::AudioUrl(raw),
        UrlKind::Video => Content::VideoUrl(raw),
        UrlKind::Mesh3D => Content::Mesh3dUrl(raw),
        UrlKind::PointCloud3D => Content::PointCloud3dUrl(raw),
    }
}

fn tensor_content(value: &TensorValue, path: &str) -> Result<Content> {
    let dense = value.to_dense()?;
    let shape = dense
        .shape()
        .iter()
        .map(|&d| u32::try_from(d).map_err(|_| Error::encode(path, format!("dimension {d} does not fit in u32"))))
        .collect::<Result<Vec<_>>>()?;

    let proto = NdArrayProto {
        dense: Some(DenseNdArrayProto {
            buffer: dense.to_bytes(),
            shape,
            dtype: DENSE_DTYPE.to_string(),
        }),
        modality: value.modality().as_str().to_string(),
    };

    Ok(match value.backend() {
        BackendKind::NdArray => Content::Ndarray(proto),
        BackendKind::Candle => Content::CandleTensor(proto),
        BackendKind::Torch => Content::TorchTensor(proto),
    })
}

pub(crate) fn decode_dense(proto: NdArrayProto, path: &str) -> Result<DenseTensor> {
    let dense = proto
        .dense
        .ok_or_else(|| Error::decode(path, "tensor without a dense payload"))?;
    if dense.dtype != DENSE_DTYPE {
        return Err(Error::decode(
            path,
            format!("unsupported dtype '{}', expected '{DENSE_DTYPE}'", dense.dtype),
        ));
    }

    let shape = dense
        .shape
        .iter()
        .map(|&d| usize::try_from(d).map_err(|_| Error::decode(path, format!("dimension {d} does not fit in usize"))))
        .collect::<Result<Vec<_>>>()?;
    DenseTensor::from_bytes(shape, &dense.buffer).map_err(|e| Error::decode(path, e.to_string()))
}

/// Encoder and decoder for documents
#[derive(Debug, Clone, Default)]
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    /// Create a codec with the given limits
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// Get the codec limits
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encode a document into its protobuf message
    pub fn to_proto(&self, doc: &Document) -> Result<DocumentProto> {
        self.encode_document(doc, doc.schema().name(), 0)
    }

    /// Encode a document into protobuf bytes
    pub fn to_wire(&self, doc: &Document) -> Result<Vec<u8>> {
        let proto = self.to_proto(doc)?;
        let size = proto.encoded_len();
        self.check_size(size)?;
        debug!(document = doc.schema().name(), id = doc.id(), bytes = size, "encoded document");
        Ok(proto.encode_to_vec())
    }

    /// Rebuild a document of `schema` from its protobuf message
    pub fn from_proto(&self, proto: DocumentProto, schema: &Arc<DocumentSchema>) -> Result<Document> {
        self.decode_document(proto, schema, schema.name(), 0)
    }

    /// Rebuild a document of `schema` from protobuf bytes
    pub fn from_wire(&self, bytes: &[u8], schema: &Arc<DocumentSchema>) -> Result<Document> {
        let proto = self.decode_message(bytes)?;
        let doc = self.from_proto(proto, schema)?;
        debug!(document = schema.name(), id = doc.id(), bytes = bytes.len(), "decoded document");
        Ok(doc)
    }

    pub(crate) fn decode_message(&self, bytes: &[u8]) -> Result<DocumentProto> {
        self.check_size(bytes.len())?;
        DocumentProto::decode(bytes).map_err(|e| Error::decode("<message>", e.to_string()))
    }

    fn check_size(&self, size: usize) -> Result<()> {
        if size > self.config.max_message_bytes {
            return Err(Error::MessageTooLarge {
                size,
                limit: self.config.max_message_bytes,
            });
        }
        Ok(())
    }

    pub(crate) fn depth_exceeded(&self, depth: usize) -> Option<String> {
        (depth > self.config.max_depth).then(|| format!("nesting exceeds the limit of {}", self.config.max_depth))
    }

    fn encode_document(&self, doc: &Document, path: &str, depth: usize) -> Result<DocumentProto> {
        if let Some(reason) = self.depth_exceeded(depth) {
            return Err(Error::encode(path, reason));
        }

        let mut data = BTreeMap::new();
        for (field, value) in doc.present() {
            let child = child_path(path, field.name());
            let content = self.encode_value(value, &child, depth)?;
            data.insert(field.name().to_string(), NodeProto { content: Some(content) });
        }

        Ok(DocumentProto {
            id: doc.id().to_string(),
            data,
        })
    }

    fn encode_value(&self, value: &FieldValue, path: &str, depth: usize) -> Result<Content> {
        let content = match value {
            FieldValue::Text(s) => Content::Text(s.clone()),
            FieldValue::Bytes(b) => Content::Blob(b.clone()),
            FieldValue::Int(i) => Content::Integer(*i),
            FieldValue::Float(f) => Content::Float(*f),
            FieldValue::Bool(b) => Content::Boolean(*b),
            FieldValue::Url(url) => url_content(url.kind(), url.as_str().to_string()),
            FieldValue::Tensor(tensor) => tensor_content(tensor, path)?,
            FieldValue::Document(doc) => Content::Document(self.encode_document(doc, path, depth + 1)?),
            FieldValue::DocumentArray(array) => {
                let docs = array
                    .iter()
                    .enumerate()
                    .map(|(i, doc)| self.encode_document(doc, &format!("{path}[{i}]"), depth + 1))
                    .collect::<Result<Vec<_>>>()?;
                Content::DocumentArray(DocumentArrayProto { docs })
            }
            FieldValue::Map(map) => Content::Dict(self.encode_struct(map.iter(), path, depth + 1)?),
            FieldValue::Scores(scores) => Content::Scores(ScoresProto { values: scores.clone() }),
        };
        Ok(content)
    }

    fn encode_struct<'a>(
        &self,
        entries: impl Iterator<Item = (&'a String, &'a serde_json::Value)>,
        path: &str,
        depth: usize,
    ) -> Result<StructProto> {
        let fields = entries
            .map(|(key, value)| Ok((key.clone(), self.encode_json(value, path, depth)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(StructProto { fields })
    }

    fn encode_json(&self, value: &serde_json::Value, path: &str, depth: usize) -> Result<ValueProto> {
        if let Some(reason) = self.depth_exceeded(depth) {
            return Err(Error::encode(path, reason));
        }

        let kind = match value {
            serde_json::Value::Null => Kind::NullValue(true),
            serde_json::Value::Bool(b) => Kind::BoolValue(*b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Kind::IntegerValue(i),
                (None, Some(u)) => Kind::UnsignedValue(u),
                (None, None) => Kind::NumberValue(
                    n.as_f64()
                        .ok_or_else(|| Error::encode(path, format!("number {n} is not representable")))?,
                ),
            },
            serde_json::Value::String(s) => Kind::StringValue(s.clone()),
            serde_json::Value::Array(items) => Kind::ListValue(ListValueProto {
                values: items
                    .iter()
                    .map(|item| self.encode_json(item, path, depth + 1))
                    .collect::<Result<Vec<_>>>()?,
            }),
            serde_json::Value::Object(map) => Kind::StructValue(self.encode_struct(map.iter(), path, depth + 1)?),
        };
        Ok(ValueProto { kind: Some(kind) })
    }

    fn decode_document(
        &self,
        proto: DocumentProto,
        schema: &Arc<DocumentSchema>,
        path: &str,
        depth: usize,
    ) -> Result<Document> {
        if let Some(reason) = self.depth_exceeded(depth) {
            return Err(Error::decode(path, reason));
        }

        if let Some(unknown) = proto.data.keys().find(|key| !schema.contains(key)) {
            return Err(Error::decode(
                &child_path(path, unknown),
                format!("{} has no field '{unknown}'", schema.name()),
            ));
        }
        if let Some(missing) = schema
            .fields()
            .iter()
            .find(|field| field.is_required() && !proto.data.contains_key(field.name()))
        {
            return Err(Error::decode(
                &child_path(path, missing.name()),
                "missing required field",
            ));
        }

        let mut builder = Document::builder(Arc::clone(schema));
        if !proto.id.is_empty() {
            builder = builder.id(proto.id);
        }
        for (name, node) in proto.data {
            let field = schema.field_by_name(&name)?;
            let child = child_path(path, &name);
            let value = self.decode_value(field, schema, node, &child, depth)?;
            trace!(path = %child, kind = value.kind_name(), "decoded field");
            builder = builder.set(&name, value);
        }

        Ok(builder.build()?)
    }

    fn decode_value(
        &self,
        field: &Field,
        owner: &Arc<DocumentSchema>,
        node: NodeProto,
        path: &str,
        depth: usize,
    ) -> Result<FieldValue> {
        let content = node.content.ok_or_else(|| Error::decode(path, "empty node"))?;

        let value = match (&field.field_type, content) {
            (FieldType::Text, Content::Text(s)) => FieldValue::Text(s),
            (FieldType::Bytes, Content::Blob(b)) => FieldValue::Bytes(b),
            (FieldType::Int, Content::Integer(i)) => FieldValue::Int(i),
            (FieldType::Float, Content::Float(f)) => FieldValue::Float(f),
            // widened on assignment
            (FieldType::Float, Content::Integer(i)) => FieldValue::Int(i),
            (FieldType::Bool, Content::Boolean(b)) => FieldValue::Bool(b),

            (
                FieldType::Url(kind),
                Content::AnyUrl(raw)
                | Content::ImageUrl(raw)
                | Content::TextUrl(raw)
                | Content::AudioUrl(raw)
                | Content::VideoUrl(raw)
                | Content::Mesh3dUrl(raw)
                | Content::PointCloud3dUrl(raw),
            ) => FieldValue::Url(DocUrl::parse(*kind, raw)?),

            (FieldType::Tensor(declared), Content::Ndarray(proto)) => {
                decode_tensor(declared, BackendKind::NdArray, proto, path)?
            }
            (FieldType::Tensor(declared), Content::CandleTensor(proto)) => {
                decode_tensor(declared, BackendKind::Candle, proto, path)?
            }
            (FieldType::Tensor(declared), Content::TorchTensor(proto)) => {
                decode_tensor(declared, BackendKind::Torch, proto, path)?
            }

            (FieldType::Document(doc_ref), Content::Document(proto)) => {
                let doc = self.decode_document(proto, doc_ref.resolve(owner), path, depth + 1)?;
                FieldValue::Document(Box::new(doc))
            }
            (FieldType::DocumentArray(doc_ref), Content::DocumentArray(proto)) => {
                let schema = doc_ref.resolve(owner);
                let docs = proto
                    .docs
                    .into_iter()
                    .enumerate()
                    .map(|(i, doc)| self.decode_document(doc, schema, &format!("{path}[{i}]"), depth + 1))
                    .collect::<Result<Vec<_>>>()?;
                FieldValue::DocumentArray(DocumentArray::from_docs(Arc::clone(schema), docs)?)
            }

            (FieldType::Map, Content::Dict(proto)) => FieldValue::Map(self.decode_struct(proto, path, depth + 1)?),
            (FieldType::Scores, Content::Scores(proto)) => FieldValue::Scores(proto.values),

            (declared, other) => {
                return Err(Error::decode(
                    path,
                    format!("expected {declared}, got {}", content_name(&other)),
                ))
            }
        };
        Ok(value)
    }

    fn decode_struct(
        &self,
        proto: StructProto,
        path: &str,
        depth: usize,
    ) -> Result<BTreeMap<String, serde_json::Value>> {
        proto
            .fields
            .into_iter()
            .map(|(key, value)| Ok((key, self.decode_json(value, path, depth)?)))
            .collect()
    }

    fn decode_json(&self, value: ValueProto, path: &str, depth: usize) -> Result<serde_json::Value> {
        if let Some(reason) = self.depth_exceeded(depth) {
            return Err(Error::decode(path, reason));
        }

        let json = match value.kind {
            None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
            Some(Kind::NumberValue(f)) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| Error::decode(path, format!("{f} is not a finite number")))?,
            Some(Kind::StringValue(s)) => serde_json::Value::String(s),
            Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
            Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
            Some(Kind::UnsignedValue(u)) => serde_json::Value::from(u),
            Some(Kind::StructValue(proto)) => {
                serde_json::Value::Object(self.decode_struct(proto, path, depth + 1)?.into_iter().collect())
            }
            Some(Kind::ListValue(proto)) => serde_json::Value::Array(
                proto
                    .values
                    .into_iter()
                    .map(|item| self.decode_json(item, path, depth + 1))
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        Ok(json)
    }
}

fn decode_tensor(declared: &TensorField, tag: BackendKind, proto: NdArrayProto, path: &str) -> Result<FieldValue> {
    let dense = decode_dense(proto, path)?;
    let backend = declared.backend.unwrap_or(tag);
    if backend != tag {
        trace!(path, from = %tag, to = %backend, "decoding tensor into declared backend");
    }
    Ok(FieldValue::Tensor(TensorValue::from_dense(declared.modality, backend, dense)?))
}

/// Encode a document into protobuf bytes with default limits
pub fn to_wire(doc: &Document) -> Result<Vec<u8>> {
    Codec::default().to_wire(doc)
}

/// Rebuild a document of `schema` from protobuf bytes with default limits
pub fn from_wire(bytes: &[u8], schema: &Arc<DocumentSchema>) -> Result<Document> {
    Codec::default().from_wire(bytes, schema)
}

/// Encode a document into its protobuf message with default limits
pub fn to_proto(doc: &Document) -> Result<DocumentProto> {
    Codec::default().to_proto(doc)
}

/// Rebuild a document of `schema` from its protobuf message with default limits
pub fn from_proto(proto: DocumentProto, schema: &Arc<DocumentSchema>) -> Result<Document> {
    Codec::default().from_proto(proto, schema)
}
