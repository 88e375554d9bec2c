//! Backwards compatible document with a fixed schema
//!
//! Carries the fields of the older single-type document API: an optional
//! tensor and embedding on any backend, recursive `chunks` and `matches`,
//! raw content fields, free-form `tags` (always present, empty by default)
//! and optional `scores`.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::document::{Document, DocumentArray, FieldValue};
use crate::error::{Error, Result};
use crate::schema::{DefaultValue, DocRef, DocumentSchema, Field, FieldType};
use crate::tensor::{ModalityKind, TensorValue};

/// Name of the legacy document type
pub const LEGACY_DOCUMENT: &str = "LegacyDocument";

const TENSOR: usize = 0;
const CHUNKS: usize = 1;
const MATCHES: usize = 2;
const BLOB: usize = 3;
const TEXT: usize = 4;
const URL: usize = 5;
const EMBEDDING: usize = 6;
const TAGS: usize = 7;
const SCORES: usize = 8;

static SCHEMA: OnceLock<Arc<DocumentSchema>> = OnceLock::new();
static EMPTY_TAGS: BTreeMap<String, serde_json::Value> = BTreeMap::new();

fn legacy_schema() -> &'static Arc<DocumentSchema> {
    SCHEMA.get_or_init(|| {
        Arc::new(DocumentSchema::new_unchecked(
            LEGACY_DOCUMENT,
            vec![
                Field::optional("tensor", FieldType::any_tensor(ModalityKind::Generic)),
                Field::optional("chunks", FieldType::DocumentArray(DocRef::SelfRef)),
                Field::optional("matches", FieldType::DocumentArray(DocRef::SelfRef)),
                Field::optional("blob", FieldType::Bytes),
                Field::optional("text", FieldType::Text),
                Field::optional("url", FieldType::Text),
                Field::optional("embedding", FieldType::any_tensor(ModalityKind::Embedding)),
                Field::required("tags", FieldType::Map).with_default(DefaultValue::EmptyMap),
                Field::optional("scores", FieldType::Scores),
            ],
        ))
    })
}

/// A document of the fixed legacy schema
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyDocument(Document);

impl LegacyDocument {
    /// Create an empty document: `tags` is `{}` and every other field is absent
    pub fn new() -> Self {
        let schema = Arc::clone(legacy_schema());
        let mut values: Vec<Option<FieldValue>> = vec![None; schema.len()];
        values[TAGS] = Some(FieldValue::Map(BTreeMap::new()));
        Self(Document::from_values(schema, values))
    }

    /// The legacy schema
    pub fn schema() -> &'static Arc<DocumentSchema> {
        legacy_schema()
    }

    /// Get the document id
    pub fn id(&self) -> &str {
        self.0.id()
    }

    /// Get the tensor, if set
    pub fn tensor(&self) -> Option<&TensorValue> {
        self.0.value(TENSOR).and_then(FieldValue::as_tensor)
    }

    /// Set the tensor; any registered backend is accepted
    pub fn set_tensor(&mut self, tensor: impl Into<TensorValue>) -> Result<()> {
        self.0.set("tensor", FieldValue::Tensor(tensor.into()))
    }

    /// Get the embedding, if set
    pub fn embedding(&self) -> Option<&TensorValue> {
        self.0.value(EMBEDDING).and_then(FieldValue::as_tensor)
    }

    /// Set the embedding; must be 1-D or 2-D
    pub fn set_embedding(&mut self, embedding: impl Into<TensorValue>) -> Result<()> {
        self.0.set("embedding", FieldValue::Tensor(embedding.into()))
    }

    /// Get the text, if set
    pub fn text(&self) -> Option<&str> {
        self.0.value(TEXT).and_then(FieldValue::as_text)
    }

    /// Set the text
    pub fn set_text(&mut self, text: impl Into<String>) {
        *self.0.slot_mut(TEXT) = Some(FieldValue::Text(text.into()));
    }

    /// Get the blob, if set
    pub fn blob(&self) -> Option<&[u8]> {
        self.0.value(BLOB).and_then(FieldValue::as_bytes)
    }

    /// Set the blob
    pub fn set_blob(&mut self, blob: Vec<u8>) {
        *self.0.slot_mut(BLOB) = Some(FieldValue::Bytes(blob));
    }

    /// Get the URL, if set
    pub fn url(&self) -> Option<&str> {
        self.0.value(URL).and_then(FieldValue::as_text)
    }

    /// Set the URL; stored as plain text
    pub fn set_url(&mut self, url: impl Into<String>) {
        *self.0.slot_mut(URL) = Some(FieldValue::Text(url.into()));
    }

    /// Get the tags
    pub fn tags(&self) -> &BTreeMap<String, serde_json::Value> {
        self.0.value(TAGS).and_then(FieldValue::as_map).unwrap_or(&EMPTY_TAGS)
    }

    /// Set one tag
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        let slot = self.0.slot_mut(TAGS);
        if let Some(FieldValue::Map(tags)) = slot {
            tags.insert(key.into(), value.into());
        } else {
            *slot = Some(FieldValue::Map(BTreeMap::from([(key.into(), value.into())])));
        }
    }

    /// Get the scores, if any were set
    pub fn scores(&self) -> Option<&BTreeMap<String, f64>> {
        self.0.value(SCORES).and_then(FieldValue::as_scores)
    }

    /// Set one score
    pub fn set_score(&mut self, name: impl Into<String>, value: f64) {
        let slot = self.0.slot_mut(SCORES);
        if let Some(FieldValue::Scores(scores)) = slot {
            scores.insert(name.into(), value);
        } else {
            *slot = Some(FieldValue::Scores(BTreeMap::from([(name.into(), value)])));
        }
    }

    /// Get the chunks, if any
    pub fn chunks(&self) -> Option<&DocumentArray> {
        self.0.value(CHUNKS).and_then(FieldValue::as_array)
    }

    /// Append a chunk
    pub fn push_chunk(&mut self, chunk: LegacyDocument) {
        self.push_nested(CHUNKS, chunk);
    }

    /// Get the matches, if any
    pub fn matches(&self) -> Option<&DocumentArray> {
        self.0.value(MATCHES).and_then(FieldValue::as_array)
    }

    /// Append a match
    pub fn push_match(&mut self, doc: LegacyDocument) {
        self.push_nested(MATCHES, doc);
    }

    fn push_nested(&mut self, index: usize, doc: LegacyDocument) {
        let slot = self.0.slot_mut(index);
        match slot {
            Some(FieldValue::DocumentArray(array)) => array.push_unchecked(doc.0),
            _ => {
                let mut array = DocumentArray::new(Arc::clone(legacy_schema()));
                array.push_unchecked(doc.0);
                *slot = Some(FieldValue::DocumentArray(array));
            }
        }
    }

    /// Borrow the underlying document
    pub fn as_document(&self) -> &Document {
        &self.0
    }

    /// Unwrap the underlying document
    pub fn into_document(self) -> Document {
        self.0
    }
}

impl Default for LegacyDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<Document> for LegacyDocument {
    fn as_ref(&self) -> &Document {
        &self.0
    }
}

impl From<LegacyDocument> for Document {
    fn from(doc: LegacyDocument) -> Self {
        doc.0
    }
}

impl TryFrom<Document> for LegacyDocument {
    type Error = Error;

    fn try_from(doc: Document) -> Result<Self> {
        if **doc.schema() != **legacy_schema() {
            return Err(Error::Schema(format!(
                "expected a {LEGACY_DOCUMENT}, got {}",
                doc.schema().name()
            )));
        }
        Ok(Self(doc))
    }
}
