//! Storage errors

use nbforge_document::FormatError;
use std::path::PathBuf;

/// Failure reported by an object-store transport
///
/// `status` is `None` when the request never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{url} {outcome}: {message}", outcome = outcome(.status))]
pub struct TransportError {
    /// Requested URL
    pub url: String,
    /// HTTP status, if a response arrived
    pub status: Option<u16>,
    /// Diagnostic message
    pub message: String,
}

impl TransportError {
    /// Create a transport error
    pub fn new(url: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    /// Whether the failure is the transient rate-limit class
    ///
    /// HTTP 429 and failures without any response both qualify.
    #[inline]
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.status, None | Some(429))
    }
}

fn outcome(status: &Option<u16>) -> String {
    status.map_or_else(|| "failed".to_string(), |status| format!("returned {status}"))
}

/// Errors raised by storage handlers and the router
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Filesystem error
    #[error("io error for {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// No handler matches the path and no local fallback is registered
    #[error("Could not find a registered schema handler for: {0}")]
    NoHandler(String),

    /// Handler does not implement the requested operation
    #[error("{operation} is not supported by {handler}")]
    Unsupported {
        /// Operation name
        operation: &'static str,
        /// Handler name
        handler: &'static str,
    },

    /// HTTP request completed with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// Response status
        status: u16,
    },

    /// HTTP client failure
    #[error("http request to {url} failed: {source}")]
    Http {
        /// Requested URL
        url: String,
        /// Underlying error
        #[source]
        source: reqwest::Error,
    },

    /// Object-store transport failure
    #[error("object store error: {0}")]
    Transport(#[from] TransportError),

    /// Request could not be signed
    #[error("request signing failed: {0}")]
    Signing(String),

    /// Object-store listing is not well-formed XML
    #[error("invalid XML listing: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Path is not a valid location for the handler
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    /// Payload is not valid JSON
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload is not valid YAML
    #[error("invalid YAML payload: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Document could not be parsed or serialized
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl IoError {
    /// Create a filesystem error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an unsupported-operation error
    #[must_use]
    pub fn unsupported(operation: &'static str, handler: &'static str) -> Self {
        Self::Unsupported { operation, handler }
    }

    /// Create an HTTP client error
    pub fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.into(),
            source,
        }
    }
}
