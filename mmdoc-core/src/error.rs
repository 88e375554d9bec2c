//! Error types for documents, tensor variants and backend dispatch

use thiserror::Error;

use crate::backend::BackendKind;
use crate::tensor::ModalityKind;

/// Result type for mmdoc core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for mmdoc core operations
#[derive(Error, Debug)]
pub enum Error {
    /// No variant is registered for the requested (modality, backend) pair
    #[error("Unsupported backend: no {modality} variant is registered for backend '{backend}'")]
    UnsupportedBackend {
        /// Requested modality
        modality: ModalityKind,
        /// Requested backend
        backend: BackendKind,
    },

    /// A shape, dtype or format rule was violated while constructing a value
    #[error("Validation error: {subject}: {rule}")]
    Validation {
        /// What was being validated, e.g. "image tensor" or "image url"
        subject: String,
        /// The violated rule
        rule: String,
    },

    /// Undeclared field, missing required field or mismatched nested schema
    #[error("Schema error: {0}")]
    Schema(String),

    /// The backend library failed while converting a tensor
    #[error("Backend error: {0}")]
    Backend(String),

    /// Schema serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl Error {
    /// Build a validation error for a tensor of the given modality
    pub fn tensor_rule(modality: ModalityKind, rule: impl Into<String>) -> Self {
        Error::Validation {
            subject: format!("{modality} tensor"),
            rule: rule.into(),
        }
    }

    /// Build a validation error for a URL
    pub fn url_rule(subject: impl Into<String>, rule: impl Into<String>) -> Self {
        Error::Validation {
            subject: subject.into(),
            rule: rule.into(),
        }
    }

    /// Check whether this error is a validation failure
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}
