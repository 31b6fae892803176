//! Scheme-prefix storage router
//!
//! Handlers are registered as `(prefix, handler)` pairs, most recent first.
//! A path goes to the first handler whose prefix it starts with; when none
//! match, the handler registered as `"local"` takes it.

use crate::config::StorageConfig;
use crate::error::IoError;
use crate::handler::StorageHandler;
use crate::handlers::{
    DocumentHandler, HttpHandler, LocalHandler, NoIoHandler, ObjectStoreHandler, StreamHandler,
};
use nbforge_document::{load, serialize, Document, ParamValue};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Accepted extensions for document reads and writes
pub const DOCUMENT_EXTENSIONS: &[&str] = &[".ipynb", ".json", "py"];

/// Accepted extensions for parameter files
pub const PARAMETER_FILE_EXTENSIONS: &[&str] = &[".json", ".yaml", ".yml"];

/// Path marker for standard input/output
pub const STREAM_MARKER: &str = "-";

/// Key of the catch-all filesystem handler
pub const LOCAL_SCHEME: &str = "local";

/// Where a read comes from or a write goes to
#[derive(Debug, Clone, Copy)]
pub enum StorageTarget<'a> {
    /// Nothing; writes are discarded
    None,
    /// An in-memory document
    Document(&'a Document),
    /// A path or URL routed by scheme
    Path(&'a str),
}

impl<'a> From<&'a str> for StorageTarget<'a> {
    fn from(path: &'a str) -> Self {
        if path.is_empty() {
            Self::None
        } else {
            Self::Path(path)
        }
    }
}

impl<'a> From<Option<&'a str>> for StorageTarget<'a> {
    fn from(path: Option<&'a str>) -> Self {
        path.map_or(Self::None, Self::from)
    }
}

impl<'a> From<&'a Document> for StorageTarget<'a> {
    fn from(doc: &'a Document) -> Self {
        Self::Document(doc)
    }
}

/// Ordered handler registrations, most recent first
#[derive(Clone, Default)]
pub struct StorageRouter {
    handlers: Vec<(String, Arc<dyn StorageHandler>)>,
}

impl fmt::Debug for StorageRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schemes: Vec<_> = self.handlers.iter().map(|(s, h)| (s.as_str(), h.name())).collect();
        f.debug_struct("StorageRouter").field("handlers", &schemes).finish()
    }
}

impl StorageRouter {
    /// Create an empty router
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a router with the built-in handlers
    ///
    /// Registration order: `local`, `s3://`, `minio://`, `gs://`, `abs://`,
    /// `http://`, `https://`, `-`.
    ///
    /// # Errors
    ///
    /// Returns an `IoError` if a remote handler cannot be configured.
    pub fn with_defaults(config: &StorageConfig) -> Result<Self, IoError> {
        let mut router = Self::new();
        let s3: Arc<dyn StorageHandler> = Arc::new(ObjectStoreHandler::s3(config)?);
        let http: Arc<dyn StorageHandler> =
            Arc::new(HttpHandler::new(Duration::from_secs(config.timeout_secs))?);

        router.register(LOCAL_SCHEME, Arc::new(LocalHandler::new()));
        router.register("s3://", Arc::clone(&s3));
        router.register("minio://", s3);
        router.register("gs://", Arc::new(ObjectStoreHandler::gcs(config)?));
        router.register("abs://", Arc::new(ObjectStoreHandler::azure(config)?));
        router.register("http://", Arc::clone(&http));
        router.register("https://", http);
        router.register(STREAM_MARKER, Arc::new(StreamHandler));
        Ok(router)
    }

    /// Register `handler` for paths starting with `scheme`
    pub fn register(&mut self, scheme: impl Into<String>, handler: Arc<dyn StorageHandler>) {
        let scheme = scheme.into();
        tracing::debug!(scheme = %scheme, handler = handler.name(), "registering storage handler");
        self.handlers.insert(0, (scheme, handler));
    }

    /// Remove every registration
    pub fn reset(&mut self) {
        self.handlers.clear();
    }

    /// Registered schemes, most recent first
    #[must_use]
    pub fn schemes(&self) -> Vec<&str> {
        self.handlers.iter().map(|(s, _)| s.as_str()).collect()
    }

    /// Resolve the handler for `path`
    ///
    /// When `extensions` is given, a basename without any extension, or one
    /// matching none of `extensions`, logs a warning.
    ///
    /// # Errors
    ///
    /// Returns `IoError::NoHandler` when no prefix matches and no `local`
    /// handler is registered.
    pub fn get_handler(
        &self,
        path: &str,
        extensions: Option<&[&str]>,
    ) -> Result<Arc<dyn StorageHandler>, IoError> {
        if let Some(extensions) = extensions {
            warn_on_extension(path, extensions);
        }

        let mut local = None;
        for (scheme, handler) in &self.handlers {
            if scheme == LOCAL_SCHEME && local.is_none() {
                local = Some(handler);
            }
            if path.starts_with(scheme.as_str()) {
                tracing::debug!(path, scheme = %scheme, handler = handler.name(), "resolved handler");
                return Ok(Arc::clone(handler));
            }
        }
        local
            .map(Arc::clone)
            .ok_or_else(|| IoError::NoHandler(path.to_string()))
    }

    /// Read text from `target`
    ///
    /// # Errors
    ///
    /// Returns the handler's `IoError`.
    pub fn read<'a>(&self, target: impl Into<StorageTarget<'a>>) -> Result<String, IoError> {
        self.read_with(target, Some(DOCUMENT_EXTENSIONS))
    }

    /// Read text from `target`, checking against `extensions`
    ///
    /// # Errors
    ///
    /// Returns the handler's `IoError`.
    pub fn read_with<'a>(
        &self,
        target: impl Into<StorageTarget<'a>>,
        extensions: Option<&[&str]>,
    ) -> Result<String, IoError> {
        match target.into() {
            StorageTarget::None => NoIoHandler.read(""),
            StorageTarget::Document(doc) => DocumentHandler.read(doc),
            StorageTarget::Path(path) => self.get_handler(path, extensions)?.read(path),
        }
    }

    /// Write `buf` to `target`
    ///
    /// # Errors
    ///
    /// Returns the handler's `IoError`.
    pub fn write<'a>(&self, buf: &str, target: impl Into<StorageTarget<'a>>) -> Result<(), IoError> {
        self.write_with(buf, target, Some(DOCUMENT_EXTENSIONS))
    }

    /// Write `buf` to `target`, checking against `extensions`
    ///
    /// # Errors
    ///
    /// Returns the handler's `IoError`.
    pub fn write_with<'a>(
        &self,
        buf: &str,
        target: impl Into<StorageTarget<'a>>,
        extensions: Option<&[&str]>,
    ) -> Result<(), IoError> {
        match target.into() {
            StorageTarget::None => NoIoHandler.write(buf, ""),
            StorageTarget::Document(_) => DocumentHandler.write(),
            StorageTarget::Path(path) => self.get_handler(path, extensions)?.write(buf, path),
        }
    }

    /// List entries under `path`
    ///
    /// # Errors
    ///
    /// Returns the handler's `IoError`.
    pub fn list(&self, path: &str) -> Result<Vec<String>, IoError> {
        self.get_handler(path, None)?.list(path)
    }

    /// Human-readable form of `target` for logs
    #[must_use]
    pub fn pretty_path<'a>(&self, target: impl Into<StorageTarget<'a>>) -> String {
        match target.into() {
            StorageTarget::None => NoIoHandler.pretty_path(""),
            StorageTarget::Document(_) => DocumentHandler.pretty_path(),
            StorageTarget::Path(path) => self
                .get_handler(path, None)
                .map_or_else(|_| path.to_string(), |h| h.pretty_path(path)),
        }
    }

    /// Load a document from `target`
    ///
    /// # Errors
    ///
    /// Returns an `IoError` for read failures or malformed documents.
    pub fn load_document<'a>(&self, target: impl Into<StorageTarget<'a>>) -> Result<Document, IoError> {
        let text = self.read(target)?;
        Ok(load(text.as_bytes())?)
    }

    /// Serialize and write a document to `target`
    ///
    /// # Errors
    ///
    /// Returns an `IoError` for write or serialization failures.
    pub fn write_document<'a>(
        &self,
        doc: &Document,
        target: impl Into<StorageTarget<'a>>,
    ) -> Result<(), IoError> {
        self.write(&serialize(doc)?, target)
    }

    /// Read a YAML (or JSON) file as a parameter value
    ///
    /// Timestamps are not resolved; dates stay strings. An empty or
    /// comment-only file yields `ParamValue::Null`.
    ///
    /// # Errors
    ///
    /// Returns an `IoError` for read failures or malformed YAML.
    pub fn read_yaml_file(&self, path: &str) -> Result<ParamValue, IoError> {
        let text = self.read_with(path, Some(PARAMETER_FILE_EXTENSIONS))?;
        parse_yaml(&text)
    }

    /// Document files under `path`
    ///
    /// # Errors
    ///
    /// Returns the handler's `IoError`.
    pub fn list_notebook_files(&self, path: &str) -> Result<Vec<String>, IoError> {
        Ok(self
            .list(path)?
            .into_iter()
            .filter(|p| p.ends_with(".ipynb"))
            .collect())
    }

    /// Override the local handler's working directory until the guard drops
    ///
    /// `None` pins the process working directory. Returns `None`, with a
    /// warning, when no local handler is registered.
    #[must_use]
    pub fn local_cwd(&self, path: Option<&Path>) -> Option<CwdGuard> {
        let Some((_, handler)) = self.handlers.iter().find(|(s, _)| s == LOCAL_SCHEME) else {
            tracing::warn!("No local file handler detected");
            return None;
        };
        let Some(local) = handler.as_local() else {
            tracing::warn!("Local file handler does not support cwd assignment");
            return None;
        };
        let cwd = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok());
        let previous = local.set_cwd(cwd);
        Some(CwdGuard {
            handler: Arc::clone(handler),
            previous,
        })
    }
}

/// Parse YAML text into a parameter value
///
/// # Errors
///
/// Returns `IoError::Yaml` for malformed input.
pub fn parse_yaml(text: &str) -> Result<ParamValue, IoError> {
    let has_content = text.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with('#')
    });
    if !has_content {
        return Ok(ParamValue::Null);
    }
    Ok(serde_yaml::from_str::<Option<ParamValue>>(text)?.unwrap_or(ParamValue::Null))
}

/// Restores the local handler's previous working directory on drop
pub struct CwdGuard {
    handler: Arc<dyn StorageHandler>,
    previous: Option<PathBuf>,
}

impl fmt::Debug for CwdGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CwdGuard")
            .field("previous", &self.previous)
            .finish_non_exhaustive()
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        if let Some(local) = self.handler.as_local() {
            local.set_cwd(self.previous.take());
        }
    }
}

fn warn_on_extension(path: &str, extensions: &[&str]) {
    if path == STREAM_MARKER {
        return;
    }
    let basename = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let basename = basename.split('?').next().unwrap_or_default();
    if !basename.contains('.') {
        tracing::warn!("the file is not specified with any extension : {basename}");
    } else if !extensions.iter().any(|ext| basename.ends_with(ext)) {
        tracing::warn!("The specified file ({path}) does not end in one of {extensions:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Named(&'static str);

    impl StorageHandler for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn read(&self, _path: &str) -> Result<String, IoError> {
            Ok(self.0.to_string())
        }

        fn write(&self, _buf: &str, _path: &str) -> Result<(), IoError> {
            Ok(())
        }

        fn list(&self, _path: &str) -> Result<Vec<String>, IoError> {
            Ok(vec![])
        }
    }

    #[test]
    fn prefix_match_and_local_fallback() {
        let mut router = StorageRouter::new();
        router.register(LOCAL_SCHEME, Arc::new(Named("local")));
        router.register("s3://", Arc::new(Named("s3")));

        assert_eq!(router.read("s3://bucket/a.ipynb").unwrap(), "s3");
        assert_eq!(router.read("notebooks/a.ipynb").unwrap(), "local");
        assert_eq!(router.read("gs://bucket/a.ipynb").unwrap(), "local");
    }

    #[test]
    fn missing_local_fallback_errors() {
        let mut router = StorageRouter::new();
        router.register("s3://", Arc::new(Named("s3")));
        let err = router.read("a.ipynb").unwrap_err();
        assert!(matches!(err, IoError::NoHandler(p) if p == "a.ipynb"));
    }

    #[test]
    fn none_target_discards_writes() {
        let router = StorageRouter::new();
        assert!(router.write("x", StorageTarget::None).is_ok());
        assert!(router.write("x", "").is_ok());
        assert!(router.read(StorageTarget::None).is_err());
        assert_eq!(router.pretty_path(None::<&str>), "Notebook will not be saved");
    }

    #[test]
    fn document_target_serializes() {
        let router = StorageRouter::new();
        let doc = Document::new(vec![]);
        let text = router.read(&doc).unwrap();
        assert!(text.contains("\"nbformat\": 4"));
        assert!(router.write("x", &doc).is_err());
    }

    #[test]
    fn yaml_parsing_keeps_dates_as_text() {
        let value = parse_yaml("when: 2019-01-01\nn: 3\n").unwrap();
        let ParamValue::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(map["when"], ParamValue::from("2019-01-01"));
        assert_eq!(map["n"], ParamValue::Int(3));

        assert_eq!(parse_yaml("").unwrap(), ParamValue::Null);
        assert_eq!(parse_yaml("# only a comment\n").unwrap(), ParamValue::Null);
    }

    #[test]
    fn cwd_guard_restores_previous() {
        let mut router = StorageRouter::new();
        let local = Arc::new(LocalHandler::new());
        router.register(LOCAL_SCHEME, local.clone());
        local.set_cwd(Some(PathBuf::from("/original")));

        {
            let _guard = router.local_cwd(Some(Path::new("/scoped")));
            assert_eq!(local.cwd(), Some(PathBuf::from("/scoped")));
        }
        assert_eq!(local.cwd(), Some(PathBuf::from("/original")));
    }
}
