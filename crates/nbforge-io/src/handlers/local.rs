//! Local filesystem handler

use crate::error::IoError;
use crate::handler::StorageHandler;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads and writes files on the local filesystem
///
/// Relative paths resolve against an optional working-directory override
/// instead of the process working directory, so the override never leaks
/// into the rest of the process.
#[derive(Debug, Default)]
pub struct LocalHandler {
    cwd: Mutex<Option<PathBuf>>,
}

impl LocalHandler {
    /// Create a handler that resolves against the process working directory
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the working-directory override, returning the previous one
    pub fn set_cwd(&self, cwd: Option<PathBuf>) -> Option<PathBuf> {
        std::mem::replace(&mut *self.cwd.lock(), cwd)
    }

    /// Current working-directory override
    #[must_use]
    pub fn cwd(&self) -> Option<PathBuf> {
        self.cwd.lock().clone()
    }

    /// Resolve `path` against the override
    #[must_use]
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match self.cwd.lock().as_ref() {
            Some(cwd) if path.is_relative() => cwd.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl StorageHandler for LocalHandler {
    fn name(&self) -> &'static str {
        "LocalHandler"
    }

    /// Falls back to returning `path` itself when it cannot be opened but
    /// holds inline JSON, so a literal payload can be passed as a path
    fn read(&self, path: &str) -> Result<String, IoError> {
        let resolved = self.resolve(path);
        match fs::read_to_string(&resolved) {
            Ok(text) => Ok(text),
            Err(err) => {
                if serde_json::from_str::<serde_json::Value>(path).is_ok() {
                    tracing::debug!("treating path argument as inline document text");
                    Ok(path.to_string())
                } else {
                    Err(IoError::io(resolved, err))
                }
            }
        }
    }

    fn write(&self, buf: &str, path: &str) -> Result<(), IoError> {
        let resolved = self.resolve(path);
        if let Some(parent) = resolved.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| IoError::io(parent, e))?;
        }
        fs::write(&resolved, buf).map_err(|e| IoError::io(resolved, e))
    }

    fn list(&self, path: &str) -> Result<Vec<String>, IoError> {
        let resolved = self.resolve(path);
        let entries = fs::read_dir(&resolved).map_err(|e| IoError::io(&resolved, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| IoError::io(&resolved, e))?;
            names.push(
                Path::new(path)
                    .join(entry.file_name())
                    .to_string_lossy()
                    .into_owned(),
            );
        }
        names.sort();
        Ok(names)
    }

    fn as_local(&self) -> Option<&LocalHandler> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let handler = LocalHandler::new();
        let path = dir.path().join("nested/deeper/out.ipynb");
        let path = path.to_str().unwrap();

        handler.write("{}", path).unwrap();
        assert_eq!(handler.read(path).unwrap(), "{}");
    }

    #[test]
    fn relative_paths_use_override() {
        let dir = tempfile::tempdir().unwrap();
        let handler = LocalHandler::new();
        assert!(handler.set_cwd(Some(dir.path().to_path_buf())).is_none());

        handler.write("hello", "a.txt").unwrap();
        assert!(dir.path().join("a.txt").exists());
        assert_eq!(handler.read("a.txt").unwrap(), "hello");
        assert_eq!(handler.list(".").unwrap(), vec!["./a.txt".to_string()]);

        let previous = handler.set_cwd(None);
        assert_eq!(previous.as_deref(), Some(dir.path()));
    }

    #[test]
    fn inline_json_fallback() {
        let handler = LocalHandler::new();
        let inline = r#"{"cells": [], "nbformat": 4}"#;
        assert_eq!(handler.read(inline).unwrap(), inline);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let handler = LocalHandler::new();
        let err = handler.read("/definitely/not/here.ipynb").unwrap_err();
        assert!(matches!(err, IoError::Io { .. }));
    }
}
