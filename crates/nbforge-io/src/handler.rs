//! The storage capability

use crate::error::IoError;
use crate::handlers::LocalHandler;

/// Backend-specific read/write/list implementation
///
/// Operations a backend cannot perform return `IoError::Unsupported`.
pub trait StorageHandler: Send + Sync {
    /// Handler name used in diagnostics
    fn name(&self) -> &'static str;

    /// Read the text stored at `path`
    ///
    /// # Errors
    ///
    /// Returns an `IoError` describing the backend failure.
    fn read(&self, path: &str) -> Result<String, IoError>;

    /// Store `buf` at `path`
    ///
    /// # Errors
    ///
    /// Returns an `IoError` describing the backend failure.
    fn write(&self, buf: &str, path: &str) -> Result<(), IoError>;

    /// List the entries under `path`
    ///
    /// # Errors
    ///
    /// Returns an `IoError` describing the backend failure.
    fn list(&self, path: &str) -> Result<Vec<String>, IoError>;

    /// Human-readable form of `path` for logs
    fn pretty_path(&self, path: &str) -> String {
        path.to_string()
    }

    /// Access the local-filesystem handler behind this handler, if any
    fn as_local(&self) -> Option<&LocalHandler> {
        None
    }
}
