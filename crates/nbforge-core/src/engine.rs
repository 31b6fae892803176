//! Execution engines
//!
//! An [`Engine`] takes a parameterized document and returns it executed,
//! with outputs attached to each cell. Engines are looked up by name in an
//! [`EngineRegistry`].

use crate::error::NbforgeError;
use nbforge_document::{load, serialize, Document};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

/// Where and how a document should be executed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Resolved kernel name
    pub kernel_name: String,
    /// Resolved language
    pub language: String,
    /// Working directory for the execution runtime
    pub cwd: Option<PathBuf>,
}

/// Executes documents
#[cfg_attr(test, mockall::automock)]
pub trait Engine: Send + Sync {
    /// Registry name
    fn name(&self) -> &'static str;

    /// Execute `doc`, returning it with outputs attached
    ///
    /// Cell errors are reported as error outputs, not as `Err`.
    ///
    /// # Errors
    ///
    /// Returns `NbforgeError::RuntimeDied` if the runtime terminates
    /// abnormally and `NbforgeError::Engine` if the engine cannot run.
    fn execute(&self, doc: Document, context: &ExecutionContext) -> Result<Document, NbforgeError>;
}

/// Returns documents unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughEngine;

impl Engine for PassthroughEngine {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn execute(&self, doc: Document, _context: &ExecutionContext) -> Result<Document, NbforgeError> {
        Ok(doc)
    }
}

const DEAD_KERNEL_MARKERS: &[&str] = &["DeadKernelError", "Kernel died"];

/// Runs `jupyter nbconvert --execute` as a subprocess
///
/// The document is piped through stdin and read back from stdout. Cell
/// errors stay in the document; a dead kernel becomes
/// `NbforgeError::RuntimeDied`.
#[derive(Debug, Clone)]
pub struct NbconvertEngine {
    program: String,
}

impl Default for NbconvertEngine {
    fn default() -> Self {
        Self::new("jupyter")
    }
}

impl NbconvertEngine {
    /// Create an engine driving `program`
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, context: &ExecutionContext) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "nbconvert",
            "--to",
            "notebook",
            "--execute",
            "--allow-errors",
            "--stdin",
            "--stdout",
        ]);
        if !context.kernel_name.is_empty() {
            cmd.arg(format!("--ExecutePreprocessor.kernel_name={}", context.kernel_name));
        }
        if let Some(cwd) = &context.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Engine for NbconvertEngine {
    fn name(&self) -> &'static str {
        "nbconvert"
    }

    fn execute(&self, doc: Document, context: &ExecutionContext) -> Result<Document, NbforgeError> {
        let input = serialize(&doc)?;
        let mut child = self
            .command(context)
            .spawn()
            .map_err(|e| NbforgeError::engine(self.name(), format!("failed to spawn {}: {e}", self.program)))?;

        // stdin is written from a thread so a full stdout pipe cannot stall it
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || stdin.write_all(input.as_bytes()))
        });
        let output = child
            .wait_with_output()
            .map_err(|e| NbforgeError::engine(self.name(), e.to_string()))?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!("engine closed stdin early: {e}"),
                Err(_) => return Err(NbforgeError::engine(self.name(), "stdin writer panicked")),
            }
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if DEAD_KERNEL_MARKERS.iter().any(|m| stderr.contains(m)) {
            return Err(NbforgeError::RuntimeDied(last_line(&stderr)));
        }
        if !output.status.success() {
            return Err(NbforgeError::engine(
                self.name(),
                format!("exited with {}: {}", output.status, last_line(&stderr)),
            ));
        }
        Ok(load(&output.stdout)?)
    }
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Named engines, most recently registered first
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: Vec<Arc<dyn Engine>>,
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.names())
            .finish()
    }
}

impl EngineRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `nbconvert` (driving `jupyter`) and `passthrough`
    #[must_use]
    pub fn with_defaults(jupyter: &str) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NbconvertEngine::new(jupyter)));
        registry.register(Arc::new(PassthroughEngine));
        registry
    }

    /// Register an engine; it shadows any earlier engine of the same name
    pub fn register(&mut self, engine: Arc<dyn Engine>) {
        self.engines.insert(0, engine);
    }

    /// Registered names, most recent first
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    /// Look up an engine by name
    ///
    /// # Errors
    ///
    /// Returns `NbforgeError::NoEngine` if nothing is registered as `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Engine>, NbforgeError> {
        self.engines
            .iter()
            .find(|e| e.name() == name)
            .map(Arc::clone)
            .ok_or_else(|| NbforgeError::NoEngine(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbforge_document::{Cell, Output};

    #[test]
    fn later_registrations_shadow_earlier() {
        let mut registry = EngineRegistry::with_defaults("jupyter");
        assert_eq!(registry.names(), vec!["passthrough", "nbconvert"]);

        let mut custom = MockEngine::new();
        custom.expect_name().return_const("nbconvert");
        custom
            .expect_execute()
            .times(1)
            .returning(|mut doc, _| {
                doc.cells[0].outputs.push(Output::stream("stdout", "hi\n"));
                Ok(doc)
            });
        registry.register(Arc::new(custom));

        let engine = registry.get("nbconvert").unwrap();
        let doc = engine
            .execute(Document::new(vec![Cell::code("print('hi')")]), &ExecutionContext::default())
            .unwrap();
        assert_eq!(doc.cells[0].outputs.len(), 1);
    }

    #[test]
    fn unknown_engine() {
        let registry = EngineRegistry::with_defaults("jupyter");
        assert!(matches!(registry.get("missing"), Err(NbforgeError::NoEngine(name)) if name == "missing"));
    }

    #[test]
    fn passthrough_keeps_the_document() {
        let doc = Document::new(vec![Cell::code("x = 1")]);
        let out = PassthroughEngine.execute(doc.clone(), &ExecutionContext::default()).unwrap();
        assert_eq!(out, doc);
    }

    #[test]
    fn missing_program_is_an_engine_failure() {
        let engine = NbconvertEngine::new("nbforge-no-such-program");
        let err = engine
            .execute(Document::new(vec![]), &ExecutionContext::default())
            .unwrap_err();
        assert!(matches!(err, NbforgeError::Engine { ref engine, .. } if engine == "nbconvert"));
        assert!(err.is_retryable());
    }

    #[test]
    fn last_nonblank_line() {
        assert_eq!(last_line("a\nTraceback\nDeadKernelError: Kernel died\n\n"), "DeadKernelError: Kernel died");
        assert_eq!(last_line(""), "");
    }
}
