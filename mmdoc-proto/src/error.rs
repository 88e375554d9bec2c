//! Error types for the wire codec

use thiserror::Error;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for codec operations
#[derive(Error, Debug)]
pub enum Error {
    /// A value failed validation while the document was rebuilt
    #[error(transparent)]
    Core(#[from] mmdoc_core::Error),

    /// Malformed bytes, or a message that does not fit the schema
    #[error("Decode error at '{path}': {reason}")]
    Decode {
        /// Field path, e.g. `Page.images[2].tensor`
        path: String,
        /// What went wrong
        reason: String,
    },

    /// A message exceeds the configured size limit
    #[error("Message too large: {size} bytes exceeds the limit of {limit} bytes")]
    MessageTooLarge {
        /// Encoded size
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// A document cannot be represented on the wire
    #[error("Encode error at '{path}': {reason}")]
    Encode {
        /// Field path
        path: String,
        /// What went wrong
        reason: String,
    },
}

impl Error {
    pub(crate) fn decode(path: &str, reason: impl Into<String>) -> Self {
        Error::Decode {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn encode(path: &str, reason: impl Into<String>) -> Self {
        Error::Encode {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Check whether this is a decode failure
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode { .. })
    }
}
