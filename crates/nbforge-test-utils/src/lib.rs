//! Testing utilities for the nbforge workspace
//!
//! Shared document builders, a scripted execution engine and an in-memory
//! storage handler.

#![allow(missing_docs)]

use nbforge_core::{Engine, ExecutionContext, NbforgeError};
use nbforge_document::{Cell, Document, Output, ParamValue, Parameters};
use nbforge_io::{IoError, StorageHandler, StorageRouter};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const MEMORY_SCHEME: &str = "mem://";

pub fn python_document(cells: Vec<Cell>) -> Document {
    Document::new(cells).with_kernel("python3", "python")
}

pub fn parameters_cell(source: &str) -> Cell {
    Cell::code(source).with_tag("parameters")
}

pub fn tagged_code(source: &str, tag: &str) -> Cell {
    Cell::code(source).with_tag(tag)
}

pub fn parameters(pairs: &[(&str, ParamValue)]) -> Parameters {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect()
}

/// `parameters` cell declaring `a = 1`, then an `etl` cell reading `a` and
/// calling an undefined `helper()`
pub fn etl_document() -> Document {
    python_document(vec![
        parameters_cell("a = 1"),
        tagged_code("b = a + 1\nhelper()", "etl"),
    ])
}

#[derive(Debug, Clone)]
struct Failure {
    needle: String,
    ename: String,
    evalue: String,
}

/// Engine that "executes" cells by rule
///
/// Every code cell gets an execution count. Cells whose source contains a
/// registered needle get an error output, like a kernel run with errors
/// allowed.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    failures: Vec<Failure>,
    stdout: Vec<(String, String)>,
    dies: Option<String>,
    calls: AtomicUsize,
    last_context: Mutex<Option<ExecutionContext>>,
    last_input: Mutex<Option<Document>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, needle: &str, ename: &str, evalue: &str) -> Self {
        self.failures.push(Failure {
            needle: needle.to_string(),
            ename: ename.to_string(),
            evalue: evalue.to_string(),
        });
        self
    }

    pub fn print_on(mut self, needle: &str, text: &str) -> Self {
        self.stdout.push((needle.to_string(), text.to_string()));
        self
    }

    pub fn dies(mut self, message: &str) -> Self {
        self.dies = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_context(&self) -> Option<ExecutionContext> {
        self.last_context.lock().clone()
    }

    /// Document as it was handed to the engine
    pub fn last_input(&self) -> Option<Document> {
        self.last_input.lock().clone()
    }
}

impl Engine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn execute(&self, mut doc: Document, context: &ExecutionContext) -> Result<Document, NbforgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_context.lock() = Some(context.clone());
        *self.last_input.lock() = Some(doc.clone());
        if let Some(message) = &self.dies {
            return Err(NbforgeError::RuntimeDied(message.clone()));
        }

        let mut count = 0;
        for cell in doc.cells.iter_mut().filter(|c| c.is_code()) {
            count += 1;
            cell.execution_count = Some(count);
            cell.outputs.clear();
            for (needle, text) in &self.stdout {
                if cell.source.contains(needle.as_str()) {
                    cell.outputs.push(Output::stream("stdout", text));
                }
            }
            for failure in &self.failures {
                if cell.source.contains(failure.needle.as_str()) {
                    cell.outputs.push(Output::error(
                        &failure.ename,
                        &failure.evalue,
                        vec![format!("{}: {}", failure.ename, failure.evalue)],
                    ));
                }
            }
        }
        Ok(doc)
    }
}

/// Handler keeping files in memory, keyed by full path
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files.lock().insert(path.to_string(), content.to_string());
        self
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.files.lock().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.lock().keys().cloned().collect()
    }
}

impl StorageHandler for MemoryStorage {
    fn name(&self) -> &'static str {
        "MemoryStorage"
    }

    fn read(&self, path: &str) -> Result<String, IoError> {
        self.get(path).ok_or_else(|| {
            IoError::io(
                PathBuf::from(path),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            )
        })
    }

    fn write(&self, buf: &str, path: &str) -> Result<(), IoError> {
        self.files.lock().insert(path.to_string(), buf.to_string());
        Ok(())
    }

    fn list(&self, path: &str) -> Result<Vec<String>, IoError> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        Ok(self
            .files
            .lock()
            .keys()
            .filter(|p| p.starts_with(&prefix))
            .cloned()
            .collect())
    }
}

/// Router with local files, the stream marker and `storage` under [`MEMORY_SCHEME`]
pub fn memory_router(storage: Arc<MemoryStorage>) -> StorageRouter {
    let mut router = StorageRouter::new();
    router.register(nbforge_io::LOCAL_SCHEME, Arc::new(nbforge_io::LocalHandler::new()));
    router.register(nbforge_io::STREAM_MARKER, Arc::new(nbforge_io::StreamHandler));
    router.register(MEMORY_SCHEME, storage);
    router
}
