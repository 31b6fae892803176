//! Error types for nbforge runs
//!
//! Every component error converts into [`NbforgeError`], which also decides
//! the process exit code.

use crate::failure::ExecutionError;
use nbforge_document::{FormatError, MetadataError};
use nbforge_extract::ExtractError;
use nbforge_io::IoError;
use nbforge_translate::TranslateError;

/// Exit code for a run whose execution runtime died
pub const RUNTIME_DIED_EXIT_CODE: i32 = 138;

/// Main nbforge error type
#[derive(Debug, thiserror::Error)]
pub enum NbforgeError {
    /// Malformed document
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Missing kernel or language metadata
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Translator lookup failed
    #[error(transparent)]
    Translate(#[from] TranslateError),

    /// Storage failure
    #[error(transparent)]
    Io(#[from] IoError),

    /// Unit extraction failed
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// A cell raised during execution
    #[error("{0}")]
    Execution(Box<ExecutionError>),

    /// The execution runtime terminated abnormally
    #[error("execution runtime died: {0}")]
    RuntimeDied(String),

    /// The engine could not run the document
    #[error("engine '{engine}' failed: {message}")]
    Engine {
        /// Engine name
        engine: String,
        /// Failure description
        message: String,
    },

    /// No engine registered under the name
    #[error("no execution engine registered as '{0}'")]
    NoEngine(String),

    /// A path template names a parameter that has no value
    #[error("missing parameter '{0}'")]
    MissingParameter(String),

    /// A path template is malformed
    #[error("invalid path template '{template}': {message}")]
    Template {
        /// Offending template
        template: String,
        /// What is wrong with it
        message: String,
    },

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),
}

impl NbforgeError {
    /// Process exit code for this failure
    #[inline]
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::RuntimeDied(_) => RUNTIME_DIED_EXIT_CODE,
            _ => 1,
        }
    }

    /// Check if error is retryable
    ///
    /// Only engine launch failures are; rate limits are retried inside the
    /// storage handlers and every other failure is final.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Engine { .. })
    }

    /// Create an engine failure
    pub fn engine(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Engine {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Create a template failure
    pub fn template(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Template {
            template: template.into(),
            message: message.into(),
        }
    }
}

impl From<ExecutionError> for NbforgeError {
    fn from(err: ExecutionError) -> Self {
        Self::Execution(Box::new(err))
    }
}
