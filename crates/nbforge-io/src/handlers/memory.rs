//! Handlers that never touch storage

use crate::error::IoError;
use crate::handler::StorageHandler;
use nbforge_document::{serialize, Document};

/// Target for a `None` output path: writes are discarded
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIoHandler;

impl StorageHandler for NoIoHandler {
    fn name(&self) -> &'static str {
        "NoIOHandler"
    }

    fn read(&self, _path: &str) -> Result<String, IoError> {
        Err(IoError::unsupported("read", "NoIOHandler"))
    }

    fn write(&self, _buf: &str, _path: &str) -> Result<(), IoError> {
        Ok(())
    }

    fn list(&self, _path: &str) -> Result<Vec<String>, IoError> {
        Err(IoError::unsupported("listdir", "NoIOHandler"))
    }

    fn pretty_path(&self, _path: &str) -> String {
        "Notebook will not be saved".to_string()
    }
}

/// Source for an in-memory document passed in place of a path
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentHandler;

impl DocumentHandler {
    /// Serialize the document as if it had been read from storage
    ///
    /// # Errors
    ///
    /// Returns `IoError::Format` if serialization fails.
    pub fn read(self, doc: &Document) -> Result<String, IoError> {
        Ok(serialize(doc)?)
    }

    /// Writing back into an in-memory document is not supported
    ///
    /// # Errors
    ///
    /// Always returns `IoError::Unsupported`.
    pub fn write(self) -> Result<(), IoError> {
        Err(IoError::unsupported("write", "DocumentHandler"))
    }

    /// Label used in logs
    #[must_use]
    pub fn pretty_path(self) -> String {
        "Document object".to_string()
    }
}
