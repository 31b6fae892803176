//! Translator errors

/// Errors raised by translator lookup and parameter-cell inspection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    /// Neither the kernel name nor the language has a registered translator
    #[error("no translator found for kernel '{kernel_name}' and language '{language}'")]
    NoTranslator {
        /// Requested kernel name
        kernel_name: String,
        /// Requested language
        language: String,
    },

    /// The translator cannot introspect parameter cells
    #[error("parameter inspection is not supported for {0}")]
    InspectionUnsupported(String),

    /// The grammar could not be loaded into the parser
    #[error("parser initialization failed: {0}")]
    ParserInit(String),
}

impl TranslateError {
    /// Create a lookup failure for a kernel/language pair
    pub fn no_translator(kernel_name: impl Into<String>, language: impl Into<String>) -> Self {
        Self::NoTranslator {
            kernel_name: kernel_name.into(),
            language: language.into(),
        }
    }
}
