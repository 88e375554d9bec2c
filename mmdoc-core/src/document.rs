//! Documents: schema-checked collections of typed field values

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::schema::{DefaultValue, DocumentSchema, Field, FieldType};
use crate::tensor::{Modality, TensorValue, Variant};
use crate::url::DocUrl;

/// The value stored in one document field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// UTF-8 text
    Text(String),

    /// Raw bytes
    Bytes(Vec<u8>),

    /// Integer
    Int(i64),

    /// Float
    Float(f64),

    /// Boolean
    Bool(bool),

    /// Validated URL
    Url(DocUrl),

    /// Tensor variant
    Tensor(TensorValue),

    /// Nested document
    Document(Box<Document>),

    /// Nested document collection
    DocumentArray(DocumentArray),

    /// Free-form mapping
    Map(BTreeMap<String, serde_json::Value>),

    /// Numeric scores
    Scores(BTreeMap<String, f64>),
}

impl FieldValue {
    /// Short name of the value kind, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "Text",
            FieldValue::Bytes(_) => "Bytes",
            FieldValue::Int(_) => "Int",
            FieldValue::Float(_) => "Float",
            FieldValue::Bool(_) => "Bool",
            FieldValue::Url(_) => "Url",
            FieldValue::Tensor(_) => "Tensor",
            FieldValue::Document(_) => "Document",
            FieldValue::DocumentArray(_) => "DocumentArray",
            FieldValue::Map(_) => "Map",
            FieldValue::Scores(_) => "Scores",
        }
    }

    /// Borrow as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get as a float; integers widen
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            #[allow(clippy::cast_precision_loss)]
            FieldValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Borrow as a URL
    pub fn as_url(&self) -> Option<&DocUrl> {
        match self {
            FieldValue::Url(u) => Some(u),
            _ => None,
        }
    }

    /// Borrow as a tensor
    pub fn as_tensor(&self) -> Option<&TensorValue> {
        match self {
            FieldValue::Tensor(t) => Some(t),
            _ => None,
        }
    }

    /// Borrow as a nested document
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            FieldValue::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Borrow as a document collection
    pub fn as_array(&self) -> Option<&DocumentArray> {
        match self {
            FieldValue::DocumentArray(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow as a mapping
    pub fn as_map(&self) -> Option<&BTreeMap<String, serde_json::Value>> {
        match self {
            FieldValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow as scores
    pub fn as_scores(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            FieldValue::Scores(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<DocUrl> for FieldValue {
    fn from(value: DocUrl) -> Self {
        FieldValue::Url(value)
    }
}

impl From<TensorValue> for FieldValue {
    fn from(value: TensorValue) -> Self {
        FieldValue::Tensor(value)
    }
}

impl<M: Modality, B: Backend> From<Variant<M, B>> for FieldValue {
    fn from(value: Variant<M, B>) -> Self {
        FieldValue::Tensor(value.into_value())
    }
}

impl From<Document> for FieldValue {
    fn from(value: Document) -> Self {
        FieldValue::Document(Box::new(value))
    }
}

impl From<DocumentArray> for FieldValue {
    fn from(value: DocumentArray) -> Self {
        FieldValue::DocumentArray(value)
    }
}

impl From<BTreeMap<String, serde_json::Value>> for FieldValue {
    fn from(value: BTreeMap<String, serde_json::Value>) -> Self {
        FieldValue::Map(value)
    }
}

impl From<BTreeMap<String, f64>> for FieldValue {
    fn from(value: BTreeMap<String, f64>) -> Self {
        FieldValue::Scores(value)
    }
}

fn mismatch(field: &Field, value: &FieldValue) -> Error {
    Error::Validation {
        subject: format!("field '{}'", field.name),
        rule: format!("expected {}, got {}", field.field_type, value.kind_name()),
    }
}

fn check_schema(field: &Field, expected: &Arc<DocumentSchema>, actual: &Arc<DocumentSchema>) -> Result<()> {
    if Arc::ptr_eq(expected, actual) || expected == actual {
        Ok(())
    } else {
        Err(Error::Schema(format!(
            "field '{}' expects {} documents, got {}",
            field.name,
            expected.name(),
            actual.name()
        )))
    }
}

/// Turn `value` into a value of the type declared by `field`
///
/// `owner` is the schema declaring the field, used to resolve self references.
pub fn coerce_value(field: &Field, owner: &Arc<DocumentSchema>, value: FieldValue) -> Result<FieldValue> {
    let coerced = match (&field.field_type, value) {
        (FieldType::Text, v @ FieldValue::Text(_))
        | (FieldType::Bytes, v @ FieldValue::Bytes(_))
        | (FieldType::Int, v @ FieldValue::Int(_))
        | (FieldType::Float, v @ FieldValue::Float(_))
        | (FieldType::Bool, v @ FieldValue::Bool(_))
        | (FieldType::Map, v @ FieldValue::Map(_))
        | (FieldType::Scores, v @ FieldValue::Scores(_)) => v,

        #[allow(clippy::cast_precision_loss)]
        (FieldType::Float, FieldValue::Int(i)) => FieldValue::Float(i as f64),

        (FieldType::Url(kind), FieldValue::Text(raw)) => FieldValue::Url(DocUrl::parse(*kind, raw)?),
        (FieldType::Url(kind), FieldValue::Url(url)) => FieldValue::Url(url.with_kind(*kind)?),

        (FieldType::Tensor(declared), FieldValue::Tensor(tensor)) => {
            let from = tensor.variant();
            let tensor = tensor.coerce(declared.modality, declared.backend)?;
            if tensor.variant() != from {
                trace!(field = %field.name, from = %from, to = %tensor.variant(), "coerced tensor field");
            }
            FieldValue::Tensor(tensor)
        }

        (FieldType::Document(doc_ref), FieldValue::Document(doc)) => {
            check_schema(field, doc_ref.resolve(owner), doc.schema())?;
            FieldValue::Document(doc)
        }

        (FieldType::DocumentArray(doc_ref), FieldValue::DocumentArray(array)) => {
            check_schema(field, doc_ref.resolve(owner), array.schema())?;
            FieldValue::DocumentArray(array)
        }

        (_, other) => return Err(mismatch(field, &other)),
    };
    Ok(coerced)
}

fn default_value(field: &Field, owner: &Arc<DocumentSchema>) -> Result<Option<FieldValue>> {
    let Some(default) = &field.default else {
        return Ok(None);
    };

    let value = match (default, &field.field_type) {
        (DefaultValue::Text(s), _) => FieldValue::Text(s.clone()),
        (DefaultValue::Int(i), _) => FieldValue::Int(*i),
        (DefaultValue::Float(f), _) => FieldValue::Float(*f),
        (DefaultValue::Bool(b), _) => FieldValue::Bool(*b),
        (DefaultValue::EmptyMap, _) => FieldValue::Map(BTreeMap::new()),
        (DefaultValue::EmptyScores, _) => FieldValue::Scores(BTreeMap::new()),
        (DefaultValue::EmptyArray, FieldType::DocumentArray(doc_ref)) => {
            FieldValue::DocumentArray(DocumentArray::new(Arc::clone(doc_ref.resolve(owner))))
        }
        (DefaultValue::EmptyArray, _) => {
            return Err(Error::Schema(format!("empty array default on non-array field '{}'", field.name)))
        }
    };
    coerce_value(field, owner, value).map(Some)
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A document conforming to a schema
///
/// Every stored value has been coerced to its field's declared type, and
/// every required field holds a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Schema describing the fields
    schema: Arc<DocumentSchema>,

    /// Document id, hex encoded uuid v4 unless given explicitly
    id: String,

    /// Field values in schema order
    values: Vec<Option<FieldValue>>,
}

impl Document {
    /// Create a document holding only default values
    ///
    /// Fails if the schema has a required field without a default.
    pub fn new(schema: Arc<DocumentSchema>) -> Result<Self> {
        Self::builder(schema).build()
    }

    /// Start building a document
    pub fn builder(schema: Arc<DocumentSchema>) -> DocumentBuilder {
        DocumentBuilder {
            schema,
            id: None,
            values: Vec::new(),
        }
    }

    /// Assemble a document from values already in schema order
    pub(crate) fn from_values(schema: Arc<DocumentSchema>, values: Vec<Option<FieldValue>>) -> Self {
        debug_assert_eq!(schema.len(), values.len());
        Self {
            schema,
            id: new_id(),
            values,
        }
    }

    pub(crate) fn value(&self, index: usize) -> Option<&FieldValue> {
        self.values[index].as_ref()
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut Option<FieldValue> {
        &mut self.values[index]
    }

    /// Get the document id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the schema of this document
    pub fn schema(&self) -> &Arc<DocumentSchema> {
        &self.schema
    }

    /// Get a field value by name; `None` if the field is absent
    pub fn get(&self, name: &str) -> Result<Option<&FieldValue>> {
        let index = self.schema.index_of(name)?;
        Ok(self.values[index].as_ref())
    }

    /// Edit a present field value and re-validate the result
    ///
    /// The edit runs on a copy; on error the document is left unchanged.
    pub fn update<F>(&mut self, name: &str, edit: F) -> Result<()>
    where
        F: FnOnce(&mut FieldValue),
    {
        let index = self.schema.index_of(name)?;
        let Some(current) = &self.values[index] else {
            return Err(Error::Schema(format!("field '{name}' of {} is not set", self.schema.name())));
        };

        let mut edited = current.clone();
        edit(&mut edited);
        let value = coerce_value(self.schema.field(index), &self.schema, edited)?;
        self.values[index] = Some(value);
        Ok(())
    }

    /// Get a tensor field by name
    pub fn get_tensor(&self, name: &str) -> Result<Option<&TensorValue>> {
        Ok(self.get(name)?.and_then(FieldValue::as_tensor))
    }

    /// Get a text field by name
    pub fn get_text(&self, name: &str) -> Result<Option<&str>> {
        Ok(self.get(name)?.and_then(FieldValue::as_text))
    }

    /// Assign a field, coercing the value to the declared type
    ///
    /// On error the document is left unchanged.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        let index = self.schema.index_of(name)?;
        let value = coerce_value(self.schema.field(index), &self.schema, value.into())?;
        self.values[index] = Some(value);
        Ok(())
    }

    /// Clear a nullable field, returning the previous value
    pub fn unset(&mut self, name: &str) -> Result<Option<FieldValue>> {
        let index = self.schema.index_of(name)?;
        if !self.schema.field(index).nullable {
            return Err(Error::Schema(format!(
                "field '{name}' of {} is not nullable",
                self.schema.name()
            )));
        }
        Ok(self.values[index].take())
    }

    /// Iterate over every declared field with its value, in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&Field, Option<&FieldValue>)> {
        self.schema.fields().iter().zip(self.values.iter().map(Option::as_ref))
    }

    /// Iterate over the fields that hold a value
    pub fn present(&self) -> impl Iterator<Item = (&Field, &FieldValue)> {
        self.iter().filter_map(|(field, value)| value.map(|v| (field, v)))
    }
}

/// All-or-nothing construction of a [`Document`]
#[derive(Debug)]
pub struct DocumentBuilder {
    schema: Arc<DocumentSchema>,
    id: Option<String>,
    values: Vec<(String, FieldValue)>,
}

impl DocumentBuilder {
    /// Use an explicit document id
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Queue a field assignment; the last assignment to a name wins
    #[must_use]
    pub fn set(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.values.push((name.to_string(), value.into()));
        self
    }

    /// Validate every value and build the document
    pub fn build(self) -> Result<Document> {
        let schema = self.schema;
        let mut values: Vec<Option<FieldValue>> = vec![None; schema.len()];

        for (name, value) in self.values {
            let index = schema.index_of(&name)?;
            values[index] = Some(coerce_value(schema.field(index), &schema, value)?);
        }

        for (field, slot) in schema.fields().iter().zip(values.iter_mut()) {
            if slot.is_none() {
                *slot = default_value(field, &schema)?;
            }
            if slot.is_none() && !field.nullable {
                return Err(Error::Schema(format!(
                    "missing required field '{}' of {}",
                    field.name,
                    schema.name()
                )));
            }
        }

        Ok(Document {
            schema,
            id: self.id.unwrap_or_else(new_id),
            values,
        })
    }
}

/// An ordered collection of documents sharing one schema
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentArray {
    schema: Arc<DocumentSchema>,
    docs: Vec<Document>,
}

impl DocumentArray {
    /// Create an empty collection
    pub fn new(schema: Arc<DocumentSchema>) -> Self {
        Self { schema, docs: Vec::new() }
    }

    /// Create a collection, checking every document's schema
    pub fn from_docs(schema: Arc<DocumentSchema>, docs: Vec<Document>) -> Result<Self> {
        let mut array = Self::new(schema);
        for doc in docs {
            array.push(doc)?;
        }
        Ok(array)
    }

    /// Get the schema shared by the documents
    pub fn schema(&self) -> &Arc<DocumentSchema> {
        &self.schema
    }

    /// Append a document of the same schema
    pub fn push(&mut self, doc: Document) -> Result<()> {
        if !Arc::ptr_eq(&self.schema, doc.schema()) && self.schema != *doc.schema() {
            return Err(Error::Schema(format!(
                "cannot add a {} document to an array of {}",
                doc.schema().name(),
                self.schema.name()
            )));
        }
        self.docs.push(doc);
        Ok(())
    }

    pub(crate) fn push_unchecked(&mut self, doc: Document) {
        self.docs.push(doc);
    }

    /// Get a document by position
    pub fn get(&self, index: usize) -> Option<&Document> {
        self.docs.get(index)
    }

    /// Get the number of documents
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Iterate over the documents
    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.docs.iter()
    }

    /// Unwrap into the documents
    pub fn into_docs(self) -> Vec<Document> {
        self.docs
    }
}

impl<'a> IntoIterator for &'a DocumentArray {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::tensor::{ImageNdArray, ModalityKind, NdArrayTensor};
    use crate::url::UrlKind;

    fn image_schema() -> Arc<DocumentSchema> {
        Arc::new(
            DocumentSchema::new(
                "ImageDoc",
                vec![
                    Field::optional("url", FieldType::Url(UrlKind::Image)),
                    Field::optional("tensor", FieldType::tensor(ModalityKind::Image, BackendKind::NdArray).unwrap()),
                    Field::optional("embedding", FieldType::any_tensor(ModalityKind::Embedding)),
                    Field::required("score", FieldType::Float).with_default(DefaultValue::Float(0.0)),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_new_applies_defaults() {
        let doc = Document::new(image_schema()).unwrap();
        assert_eq!(doc.get("score").unwrap(), Some(&FieldValue::Float(0.0)));
        assert_eq!(doc.get("url").unwrap(), None);
        assert_eq!(doc.id().len(), 32);
        assert!(doc.id().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Document::new(image_schema()).unwrap();
        let b = Document::new(image_schema()).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_missing_required_field() {
        let schema = Arc::new(DocumentSchema::new("Named", vec![Field::required("name", FieldType::Text)]).unwrap());
        assert!(matches!(Document::new(Arc::clone(&schema)), Err(Error::Schema(_))));

        let doc = Document::builder(schema).set("name", "cat").build().unwrap();
        assert_eq!(doc.get_text("name").unwrap(), Some("cat"));
    }

    #[test]
    fn test_undeclared_field_rejected() {
        let mut doc = Document::new(image_schema()).unwrap();
        assert!(matches!(doc.set("nope", 1_i64), Err(Error::Schema(_))));
        assert!(matches!(doc.get("nope"), Err(Error::Schema(_))));
        assert!(matches!(
            Document::builder(image_schema()).set("nope", true).build(),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_coercions_on_assignment() {
        let mut doc = Document::new(image_schema()).unwrap();

        doc.set("score", 3_i64).unwrap();
        assert_eq!(doc.get("score").unwrap(), Some(&FieldValue::Float(3.0)));

        doc.set("url", "http://jina.ai/cat.png").unwrap();
        let url = doc.get("url").unwrap().and_then(FieldValue::as_url).unwrap();
        assert_eq!(url.kind(), UrlKind::Image);

        doc.set("embedding", NdArrayTensor::zeros(&[100, 1]).unwrap()).unwrap();
        let embedding = doc.get_tensor("embedding").unwrap().unwrap();
        assert_eq!(embedding.variant().name(), "NdArrayEmbedding");
    }

    #[test]
    fn test_failed_set_leaves_document_unchanged() {
        let mut doc = Document::new(image_schema()).unwrap();
        doc.set("tensor", ImageNdArray::zeros(&[8, 8, 3]).unwrap()).unwrap();
        let before = doc.clone();

        let err = doc.set("tensor", NdArrayTensor::zeros(&[2, 2, 2, 2]).unwrap()).unwrap_err();
        assert!(err.is_validation());
        assert!(doc.set("url", "http://jina.ai/song.mp3").unwrap_err().is_validation());
        assert!(doc.set("score", "high").unwrap_err().is_validation());
        assert_eq!(doc, before);
    }

    #[test]
    fn test_update_revalidates_edit() {
        let mut doc = Document::new(image_schema()).unwrap();
        assert!(matches!(doc.update("tensor", |_| {}), Err(Error::Schema(_))));

        doc.set("tensor", ImageNdArray::zeros(&[8, 8, 3]).unwrap()).unwrap();
        let before = doc.clone();
        let err = doc
            .update("tensor", |value| *value = FieldValue::Text("oops".to_string()))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(doc, before);

        doc.update("score", |value| *value = FieldValue::Int(2)).unwrap();
        assert_eq!(doc.get("score").unwrap(), Some(&FieldValue::Float(2.0)));
    }

    #[test]
    fn test_unset_requires_nullable() {
        let mut doc = Document::builder(image_schema())
            .set("url", "a.jpg")
            .build()
            .unwrap();
        assert!(doc.unset("url").unwrap().is_some());
        assert_eq!(doc.get("url").unwrap(), None);
        assert!(matches!(doc.unset("score"), Err(Error::Schema(_))));
    }

    #[test]
    fn test_nested_schema_must_match() {
        let inner = image_schema();
        let other = Arc::new(DocumentSchema::new("Other", vec![Field::optional("t", FieldType::Text)]).unwrap());
        let outer = Arc::new(
            DocumentSchema::new(
                "Page",
                vec![
                    Field::optional("cover", FieldType::document(Arc::clone(&inner))),
                    Field::required("images", FieldType::document_array(Arc::clone(&inner)))
                        .with_default(DefaultValue::EmptyArray),
                ],
            )
            .unwrap(),
        );

        let mut page = Document::new(Arc::clone(&outer)).unwrap();
        assert!(page.get("images").unwrap().and_then(FieldValue::as_array).unwrap().is_empty());

        page.set("cover", Document::new(Arc::clone(&inner)).unwrap()).unwrap();
        let err = page.set("cover", Document::new(Arc::clone(&other)).unwrap()).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));

        let mut images = DocumentArray::new(Arc::clone(&inner));
        images.push(Document::new(Arc::clone(&inner)).unwrap()).unwrap();
        assert!(images.push(Document::new(other).unwrap()).is_err());
        page.set("images", images).unwrap();
        assert_eq!(page.get("images").unwrap().and_then(FieldValue::as_array).unwrap().len(), 1);
    }

    #[test]
    fn test_iter_in_schema_order() {
        let doc = Document::builder(image_schema()).set("url", "x.png").build().unwrap();
        let names: Vec<_> = doc.iter().map(|(field, _)| field.name()).collect();
        assert_eq!(names, ["url", "tensor", "embedding", "score"]);
        assert_eq!(doc.present().count(), 2);
    }
}
