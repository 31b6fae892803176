//! Error types for the document model

/// Errors raised while loading or serializing a document
///
/// Malformed input is fatal; callers never retry a `FormatError`.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// Input is not valid JSON, or does not match the document schema
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    /// Document declares a schema version this crate cannot read
    #[error("unsupported nbformat version: {0}")]
    UnsupportedVersion(u64),

    /// Structural problem detected outside of deserialization
    #[error("invalid document: {0}")]
    Invalid(String),
}

impl FormatError {
    /// Create an invalid-structure error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Errors raised when required document metadata is absent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// Neither the caller nor the document names a kernel
    #[error("no kernel name found in document and no override provided")]
    MissingKernelName,

    /// Neither the caller nor the document names a language
    #[error("no language found in document and no override provided")]
    MissingLanguage,
}
