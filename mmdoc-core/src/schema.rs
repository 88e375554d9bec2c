//! Schema definition for documents

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::error::{Error, Result};
use crate::registry;
use crate::tensor::ModalityKind;
use crate::url::UrlKind;

/// Declared tensor type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorField {
    /// Modality rule applied to values
    pub modality: ModalityKind,

    /// Fixed backend, or `None` for any registered backend
    pub backend: Option<BackendKind>,
}

impl fmt::Display for TensorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.modality {
            ModalityKind::Generic => "AnyTensor",
            ModalityKind::Image => "ImageTensor",
            ModalityKind::Audio => "AudioTensor",
            ModalityKind::Video => "VideoTensor",
            ModalityKind::Embedding => "EmbeddingTensor",
        };
        match self.backend {
            Some(backend) => write!(f, "{name}[{backend}]"),
            None => write!(f, "{name}"),
        }
    }
}

/// Reference to the schema of a nested document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DocRef {
    /// A concrete schema
    Schema(Arc<DocumentSchema>),

    /// The schema that declares this field
    SelfRef,
}

impl DocRef {
    /// Resolve against the schema that declares the field
    pub fn resolve<'a>(&'a self, current: &'a Arc<DocumentSchema>) -> &'a Arc<DocumentSchema> {
        match self {
            DocRef::Schema(schema) => schema,
            DocRef::SelfRef => current,
        }
    }
}

/// Declared type of a document field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    /// UTF-8 text
    Text,

    /// Raw bytes
    Bytes,

    /// 64-bit signed integer
    Int,

    /// 64-bit float
    Float,

    /// Boolean
    Bool,

    /// URL of the given kind
    Url(UrlKind),

    /// Tensor variant
    Tensor(TensorField),

    /// Nested document
    Document(DocRef),

    /// Collection of nested documents sharing one schema
    DocumentArray(DocRef),

    /// Free-form string keyed mapping
    Map,

    /// String keyed numeric scores
    Scores,
}

impl FieldType {
    /// Declare a tensor bound to one backend
    ///
    /// Resolves through the variant registry, so declaring a field for a
    /// backend that is not available fails here.
    pub fn tensor(modality: ModalityKind, backend: BackendKind) -> Result<Self> {
        registry::select(modality, backend)?;
        Ok(FieldType::Tensor(TensorField {
            modality,
            backend: Some(backend),
        }))
    }

    /// Declare a tensor accepting any registered backend
    pub fn any_tensor(modality: ModalityKind) -> Self {
        FieldType::Tensor(TensorField { modality, backend: None })
    }

    /// Declare a nested document
    pub fn document(schema: Arc<DocumentSchema>) -> Self {
        FieldType::Document(DocRef::Schema(schema))
    }

    /// Declare a collection of nested documents
    pub fn document_array(schema: Arc<DocumentSchema>) -> Self {
        FieldType::DocumentArray(DocRef::Schema(schema))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "Text"),
            FieldType::Bytes => write!(f, "Bytes"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Bool => write!(f, "Bool"),
            FieldType::Url(kind) => write!(f, "{kind}"),
            FieldType::Tensor(tensor) => write!(f, "{tensor}"),
            FieldType::Document(DocRef::Schema(schema)) => write!(f, "{}", schema.name()),
            FieldType::Document(DocRef::SelfRef) => write!(f, "Self"),
            FieldType::DocumentArray(DocRef::Schema(schema)) => write!(f, "DocumentArray[{}]", schema.name()),
            FieldType::DocumentArray(DocRef::SelfRef) => write!(f, "DocumentArray[Self]"),
            FieldType::Map => write!(f, "Map"),
            FieldType::Scores => write!(f, "Scores"),
        }
    }
}

/// Default applied when a field is not given a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// Text default
    Text(String),

    /// Integer default
    Int(i64),

    /// Float default
    Float(f64),

    /// Boolean default
    Bool(bool),

    /// Empty mapping
    EmptyMap,

    /// Empty score mapping
    EmptyScores,

    /// Empty document collection
    EmptyArray,
}

/// A field in a document schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Name of the field
    pub name: String,

    /// Declared type of the field
    pub field_type: FieldType,

    /// Whether the field may be absent
    pub nullable: bool,

    /// Value used when none is given
    pub default: Option<DefaultValue>,
}

impl Field {
    /// Create a new field
    pub fn new(name: &str, field_type: FieldType, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            nullable,
            default: None,
        }
    }

    /// Create a field that must be given a value
    pub fn required(name: &str, field_type: FieldType) -> Self {
        Self::new(name, field_type, false)
    }

    /// Create a field that may be absent
    pub fn optional(name: &str, field_type: FieldType) -> Self {
        Self::new(name, field_type, true)
    }

    /// Set the default value
    #[must_use]
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Get the name of this field
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the declared type of this field
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Check if this field may be absent
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Check if a value must be given on construction
    pub fn is_required(&self) -> bool {
        !self.nullable && self.default.is_none()
    }

    fn check_default(&self) -> Result<()> {
        let Some(default) = &self.default else {
            return Ok(());
        };

        let fits = matches!(
            (default, &self.field_type),
            (DefaultValue::Text(_), FieldType::Text | FieldType::Url(_))
                | (DefaultValue::Int(_), FieldType::Int | FieldType::Float)
                | (DefaultValue::Float(_), FieldType::Float)
                | (DefaultValue::Bool(_), FieldType::Bool)
                | (DefaultValue::EmptyMap, FieldType::Map)
                | (DefaultValue::EmptyScores, FieldType::Scores)
                | (DefaultValue::EmptyArray, FieldType::DocumentArray(_))
        );
        if fits {
            Ok(())
        } else {
            Err(Error::Schema(format!(
                "default {default:?} does not fit field '{}' of type {}",
                self.name, self.field_type
            )))
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "{}: Optional[{}]", self.name, self.field_type)
        } else {
            write!(f, "{}: {}", self.name, self.field_type)
        }
    }
}

/// A named, ordered set of typed fields
///
/// Deserialization goes through [`DocumentSchema::new`] at every nesting
/// level, so restored schemas carry their name index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawSchema")]
pub struct DocumentSchema {
    /// Name of the document type
    name: String,

    /// Fields in declaration order
    fields: Vec<Field>,

    /// Field indices by name for faster lookup
    #[serde(skip)]
    field_indices: HashMap<String, usize>,
}

/// Serialized form of a schema, without the name index
#[derive(Deserialize)]
struct RawSchema {
    name: String,
    fields: Vec<Field>,
}

impl TryFrom<RawSchema> for DocumentSchema {
    type Error = Error;

    fn try_from(raw: RawSchema) -> Result<Self> {
        Self::new(&raw.name, raw.fields)
    }
}

impl DocumentSchema {
    /// Create a new schema with the given fields
    ///
    /// Fails on duplicate field names and on defaults that do not fit their
    /// field type.
    pub fn new(name: &str, fields: Vec<Field>) -> Result<Self> {
        let mut field_indices = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            if field_indices.insert(field.name.clone(), i).is_some() {
                return Err(Error::Schema(format!("duplicate field '{}' in schema {name}", field.name)));
            }
            field.check_default()?;
        }

        Ok(Self {
            name: name.to_string(),
            fields,
            field_indices,
        })
    }

    /// Create a schema whose fields are known to be distinct and well typed
    pub(crate) fn new_unchecked(name: &str, fields: Vec<Field>) -> Self {
        let field_indices = fields
            .iter()
            .enumerate()
            .map(|(i, field)| (field.name.clone(), i))
            .collect();
        Self {
            name: name.to_string(),
            fields,
            field_indices,
        }
    }

    /// Get the name of the document type
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get all fields in this schema
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Get a field by index
    pub fn field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    /// Get a field by name
    pub fn field_by_name(&self, name: &str) -> Result<&Field> {
        let index = self.index_of(name)?;
        Ok(&self.fields[index])
    }

    /// Get the index of a field by name
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.field_indices
            .get(name)
            .copied()
            .ok_or_else(|| Error::Schema(format!("{} has no field '{name}'", self.name)))
    }

    /// Check whether a field is declared
    pub fn contains(&self, name: &str) -> bool {
        self.field_indices.contains_key(name)
    }

    /// Get the number of fields in this schema
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if this schema is empty
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serialize this schema to a binary format
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(Error::Serialization)
    }

    /// Deserialize a schema from a binary format
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(Error::Serialization)
    }
}

impl PartialEq for DocumentSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.fields == other.fields
    }
}

impl fmt::Display for DocumentSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {} fields", self.name, self.fields.len())?;
        for field in &self.fields {
            writeln!(f, "  {field}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_schema() -> DocumentSchema {
        DocumentSchema::new(
            "ImageDoc",
            vec![
                Field::required("url", FieldType::Url(UrlKind::Image)),
                Field::optional("tensor", FieldType::tensor(ModalityKind::Image, BackendKind::NdArray).unwrap()),
                Field::optional("embedding", FieldType::any_tensor(ModalityKind::Embedding)),
                Field::required("tags", FieldType::Map).with_default(DefaultValue::EmptyMap),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_by_name() {
        let schema = image_schema();
        assert_eq!(schema.len(), 4);
        assert_eq!(schema.index_of("embedding").unwrap(), 2);
        assert!(schema.field_by_name("url").unwrap().is_required());
        assert!(!schema.field_by_name("tags").unwrap().is_required());
        assert!(matches!(schema.index_of("missing"), Err(Error::Schema(_))));
    }

    #[test]
    fn test_duplicate_fields_rejected() {
        let result = DocumentSchema::new(
            "Dup",
            vec![Field::optional("a", FieldType::Text), Field::optional("a", FieldType::Int)],
        );
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_default_must_fit_type() {
        let result = DocumentSchema::new(
            "BadDefault",
            vec![Field::required("n", FieldType::Int).with_default(DefaultValue::EmptyMap)],
        );
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_tensor_declaration_fails_closed() {
        if !crate::backend::is_backend_available(BackendKind::Candle) {
            assert!(matches!(
                FieldType::tensor(ModalityKind::Image, BackendKind::Candle),
                Err(Error::UnsupportedBackend { .. })
            ));
        }
    }

    #[test]
    fn test_display() {
        let schema = image_schema();
        let text = schema.to_string();
        assert!(text.contains("tensor: Optional[ImageTensor[ndarray]]"));
        assert!(text.contains("url: ImageUrl"));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let inner = Arc::new(image_schema());
        let schema = DocumentSchema::new(
            "Page",
            vec![
                Field::optional("images", FieldType::document_array(inner)),
                Field::optional("children", FieldType::DocumentArray(DocRef::SelfRef)),
                Field::required("score", FieldType::Float).with_default(DefaultValue::Float(0.5)),
            ],
        )
        .unwrap();

        let bytes = schema.serialize().unwrap();
        let restored = DocumentSchema::deserialize(&bytes).unwrap();
        assert_eq!(restored, schema);
        assert_eq!(restored.index_of("score").unwrap(), 2);

        let images = restored.field_by_name("images").unwrap();
        let FieldType::DocumentArray(DocRef::Schema(nested)) = images.field_type() else {
            panic!("images is not a document array");
        };
        assert!(nested.contains("tensor"));
        assert_eq!(nested.index_of("embedding").unwrap(), 2);
    }

    #[test]
    fn test_deserialize_rechecks_nested_schemas() {
        let inner = DocumentSchema::new_unchecked(
            "Inner",
            vec![Field::optional("t", FieldType::Text), Field::optional("t", FieldType::Int)],
        );
        let outer =
            DocumentSchema::new("Outer", vec![Field::optional("child", FieldType::document(Arc::new(inner)))]).unwrap();

        let err = DocumentSchema::deserialize(&outer.serialize().unwrap()).unwrap_err();
        assert!(err.to_string().contains("duplicate field 't'"), "{err}");
    }
}
