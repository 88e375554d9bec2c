//! Schema-less decoding
//!
//! Builds an `AnyDocument` schema from the oneof tags of a message and then
//! decodes against it. Fields are sorted by name and all nullable. Tensor
//! fields are fixed to the backend of their tag and take the modality
//! recorded in the payload.

use std::collections::BTreeMap;
use std::sync::Arc;

use mmdoc_core::{BackendKind, Document, DocumentSchema, Field, FieldType, ModalityKind, UrlKind};

use crate::codec::{child_path, Codec};
use crate::error::{Error, Result};
use crate::message::node_proto::Content;
use crate::message::{DocumentArrayProto, DocumentProto, NdArrayProto, NodeProto};

/// Name of inferred document schemas
pub const ANY_DOCUMENT: &str = "AnyDocument";

fn modality_of(proto: &NdArrayProto, path: &str) -> Result<ModalityKind> {
    if proto.modality.is_empty() {
        return Ok(ModalityKind::Generic);
    }
    ModalityKind::ALL
        .into_iter()
        .find(|m| m.as_str() == proto.modality)
        .ok_or_else(|| Error::decode(path, format!("unknown modality '{}'", proto.modality)))
}

impl Codec {
    /// Decode protobuf bytes without a schema
    pub fn from_wire_inferred(&self, bytes: &[u8]) -> Result<Document> {
        let proto = self.decode_message(bytes)?;
        let schema = Arc::new(self.infer_schema(&proto)?);
        self.from_proto(proto, &schema)
    }

    /// Infer the schema of a message from its tags
    pub fn infer_schema(&self, proto: &DocumentProto) -> Result<DocumentSchema> {
        self.infer_document(proto, ANY_DOCUMENT, 0)
    }

    fn infer_document(&self, proto: &DocumentProto, path: &str, depth: usize) -> Result<DocumentSchema> {
        if let Some(reason) = self.depth_exceeded(depth) {
            return Err(Error::decode(path, reason));
        }

        // BTreeMap keys are already sorted
        let fields = proto
            .data
            .iter()
            .map(|(name, node)| Ok(Field::optional(name, self.infer_type(node, &child_path(path, name), depth)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(DocumentSchema::new(ANY_DOCUMENT, fields)?)
    }

    fn infer_array(&self, proto: &DocumentArrayProto, path: &str, depth: usize) -> Result<DocumentSchema> {
        if let Some(reason) = self.depth_exceeded(depth) {
            return Err(Error::decode(path, reason));
        }

        let mut fields: BTreeMap<&str, FieldType> = BTreeMap::new();
        for (i, doc) in proto.docs.iter().enumerate() {
            let item = format!("{path}[{i}]");
            for (name, node) in &doc.data {
                let child = child_path(&item, name);
                let field_type = self.infer_type(node, &child, depth)?;
                match fields.get(name.as_str()) {
                    Some(existing) if *existing != field_type => {
                        return Err(Error::decode(
                            &child,
                            format!("conflicting types {existing} and {field_type} across documents"),
                        ))
                    }
                    Some(_) => {}
                    None => {
                        fields.insert(name.as_str(), field_type);
                    }
                }
            }
        }

        let fields = fields
            .into_iter()
            .map(|(name, field_type)| Field::optional(name, field_type))
            .collect();
        Ok(DocumentSchema::new(ANY_DOCUMENT, fields)?)
    }

    fn infer_type(&self, node: &NodeProto, path: &str, depth: usize) -> Result<FieldType> {
        let content = node.content.as_ref().ok_or_else(|| Error::decode(path, "empty node"))?;

        let field_type = match content {
            Content::Text(_) => FieldType::Text,
            Content::Blob(_) => FieldType::Bytes,
            Content::Integer(_) => FieldType::Int,
            Content::Float(_) => FieldType::Float,
            Content::Boolean(_) => FieldType::Bool,
            Content::Ndarray(proto) => FieldType::tensor(modality_of(proto, path)?, BackendKind::NdArray)?,
            Content::CandleTensor(proto) => FieldType::tensor(modality_of(proto, path)?, BackendKind::Candle)?,
            Content::TorchTensor(proto) => FieldType::tensor(modality_of(proto, path)?, BackendKind::Torch)?,
            Content::AnyUrl(_) => FieldType::Url(UrlKind::Any),
            Content::ImageUrl(_) => FieldType::Url(UrlKind::Image),
            Content::TextUrl(_) => FieldType::Url(UrlKind::Text),
            Content::AudioUrl(_) => FieldType::Url(UrlKind::Audio),
            Content::VideoUrl(_) => FieldType::Url(UrlKind::Video),
            Content::Mesh3dUrl(_) => FieldType::Url(UrlKind::Mesh3D),
            Content::PointCloud3dUrl(_) => FieldType::Url(UrlKind::PointCloud3D),
            Content::Document(proto) => FieldType::document(Arc::new(self.infer_document(proto, path, depth + 1)?)),
            Content::DocumentArray(proto) => {
                FieldType::document_array(Arc::new(self.infer_array(proto, path, depth + 1)?))
            }
            Content::Dict(_) => FieldType::Map,
            Content::Scores(_) => FieldType::Scores,
        };
        Ok(field_type)
    }
}

/// Decode protobuf bytes without a schema, with default limits
pub fn from_wire_inferred(bytes: &[u8]) -> Result<Document> {
    Codec::default().from_wire_inferred(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{to_proto, to_wire};
    use mmdoc_core::schema::TensorField;
    use mmdoc_core::tensor::{NdArrayEmbedding, NdArrayTensor};
    use mmdoc_core::{FieldValue, LegacyDocument};
    use prost::Message;

    fn typed_doc() -> Document {
        let schema = Arc::new(
            DocumentSchema::new(
                "MyDoc",
                vec![
                    Field::required("tensor", FieldType::tensor(ModalityKind::Generic, BackendKind::NdArray).unwrap()),
                    Field::required("embedding", FieldType::any_tensor(ModalityKind::Embedding)),
                    Field::required("any_url", FieldType::Url(UrlKind::Any)),
                    Field::required("image_url", FieldType::Url(UrlKind::Image)),
                    Field::required("text_url", FieldType::Url(UrlKind::Text)),
                    Field::required("mesh_url", FieldType::Url(UrlKind::Mesh3D)),
                    Field::required("point_cloud_url", FieldType::Url(UrlKind::PointCloud3D)),
                    Field::optional("count", FieldType::Int),
                ],
            )
            .unwrap(),
        );
        Document::builder(schema)
            .set("tensor", NdArrayTensor::zeros(&[3, 224, 224]).unwrap())
            .set("embedding", NdArrayEmbedding::zeros(&[100, 1]).unwrap())
            .set("any_url", "http://jina.ai")
            .set("image_url", "http://jina.ai/bla.jpg")
            .set("text_url", "http://jina.ai")
            .set("mesh_url", "http://jina.ai/mesh.obj")
            .set("point_cloud_url", "http://jina.ai/mesh.obj")
            .build()
            .unwrap()
    }

    #[test]
    fn test_inferred_types_match_declared() {
        let doc = typed_doc();
        let decoded = from_wire_inferred(&to_wire(&doc).unwrap()).unwrap();

        assert_eq!(decoded.schema().name(), ANY_DOCUMENT);
        assert_eq!(decoded.id(), doc.id());

        let names: Vec<_> = decoded.schema().fields().iter().map(Field::name).collect();
        assert_eq!(
            names,
            ["any_url", "embedding", "image_url", "mesh_url", "point_cloud_url", "tensor", "text_url"]
        );
        assert!(decoded.schema().fields().iter().all(Field::is_nullable));

        for (field, value) in decoded.present() {
            let expected = doc.get(field.name()).unwrap().unwrap();
            assert_eq!(value, expected, "{}", field.name());
        }

        let embedding = decoded.schema().field_by_name("embedding").unwrap();
        assert_eq!(
            embedding.field_type,
            FieldType::Tensor(TensorField {
                modality: ModalityKind::Embedding,
                backend: Some(BackendKind::NdArray),
            })
        );
        let url = decoded.get("point_cloud_url").unwrap().and_then(FieldValue::as_url).unwrap();
        assert_eq!(url.kind(), UrlKind::PointCloud3D);
    }

    #[test]
    fn test_inferred_nested_documents() {
        let mut doc = LegacyDocument::new();
        doc.set_text("root");
        let mut chunk = LegacyDocument::new();
        chunk.set_text("a");
        doc.push_chunk(chunk);
        let mut chunk = LegacyDocument::new();
        chunk.set_score("rank", 1.0);
        doc.push_chunk(chunk);

        let decoded = from_wire_inferred(&to_wire(doc.as_document()).unwrap()).unwrap();
        let chunks = decoded.get("chunks").unwrap().and_then(FieldValue::as_array).unwrap();
        assert_eq!(chunks.len(), 2);

        // the array schema is the union of the chunk fields
        let names: Vec<_> = chunks.schema().fields().iter().map(Field::name).collect();
        assert_eq!(names, ["scores", "tags", "text"]);
        assert_eq!(chunks.get(0).unwrap().get_text("text").unwrap(), Some("a"));
        assert_eq!(chunks.get(1).unwrap().get("text").unwrap(), None);
    }

    #[test]
    fn test_conflicting_array_types() {
        let mut doc = LegacyDocument::new();
        doc.push_match(LegacyDocument::new());
        doc.push_match(LegacyDocument::new());
        let mut proto = to_proto(doc.as_document()).unwrap();

        if let Some(NodeProto {
            content: Some(Content::DocumentArray(matches)),
        }) = proto.data.get_mut("matches")
        {
            matches.docs[1]
                .data
                .insert("tags".to_string(), NodeProto { content: Some(Content::Integer(1)) });
        }

        let err = from_wire_inferred(&proto.encode_to_vec()).unwrap_err();
        assert!(matches!(&err, Error::Decode { path, .. } if path == "AnyDocument.matches[1].tags"), "{err}");
    }

    #[test]
    fn test_unknown_modality() {
        let mut proto = to_proto(&typed_doc()).unwrap();
        if let Some(NodeProto {
            content: Some(Content::Ndarray(tensor)),
        }) = proto.data.get_mut("tensor")
        {
            tensor.modality = "smell".to_string();
        }
        let err = from_wire_inferred(&proto.encode_to_vec()).unwrap_err();
        assert!(err.to_string().contains("smell"), "{err}");
    }
}
