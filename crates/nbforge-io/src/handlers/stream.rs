//! Standard input/output handler

use crate::error::IoError;
use crate::handler::StorageHandler;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Reads from stdin and writes to stdout, for the `-` path marker
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamHandler;

impl StorageHandler for StreamHandler {
    fn name(&self) -> &'static str {
        "Stream Handler"
    }

    fn read(&self, _path: &str) -> Result<String, IoError> {
        let mut buf = String::new();
        std::io::stdin()
            .lock()
            .read_to_string(&mut buf)
            .map_err(|e| IoError::io(PathBuf::from("<stdin>"), e))?;
        Ok(buf)
    }

    fn write(&self, buf: &str, _path: &str) -> Result<(), IoError> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(buf.as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|e| IoError::io(PathBuf::from("<stdout>"), e))
    }

    fn list(&self, _path: &str) -> Result<Vec<String>, IoError> {
        Err(IoError::unsupported("listdir", "Stream Handler"))
    }
}
