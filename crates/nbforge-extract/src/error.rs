//! Extraction errors

/// Errors raised while building, repairing or resolving extraction units
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// The assembled unit does not parse
    #[error("unit '{tag}' has a syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// Tag the unit was built for
        tag: String,
        /// One-based line of the first error node
        line: usize,
        /// One-based column of the first error node
        column: usize,
        /// Parser diagnostic
        message: String,
    },

    /// Only Python documents can be extracted
    #[error("cell extraction is not supported for language '{0}'")]
    UnsupportedLanguage(String),

    /// The grammar could not be loaded into the parser
    #[error("parser initialization failed: {0}")]
    ParserInit(String),
}

impl ExtractError {
    /// Create a syntax error from a tree position (zero-based)
    pub fn syntax(tag: impl Into<String>, row: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            tag: tag.into(),
            line: row + 1,
            column: column + 1,
            message: message.into(),
        }
    }
}
