//! Codec configuration

/// Limits applied while encoding and decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Largest encoded message accepted or produced, in bytes
    pub max_message_bytes: usize,

    /// Deepest nesting of documents and mapping values
    pub max_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: 256 * 1024 * 1024, // 256MB
            max_depth: 64,
        }
    }
}

impl CodecConfig {
    /// Set the message size limit
    #[must_use]
    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }

    /// Set the nesting limit
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
