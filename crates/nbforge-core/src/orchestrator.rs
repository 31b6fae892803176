//! Run orchestration
//!
//! A run is linear: load, parameterize, annotate metadata, strip markers
//! from a previous failure, execute, extract tagged units, persist. The
//! first cell error stops the run after the annotated document is saved.

use crate::config::NbforgeConfig;
use crate::engine::{EngineRegistry, ExecutionContext};
use crate::error::NbforgeError;
use crate::failure::{find_execution_error, mark_execution_error, strip_error_markers};
use crate::inspection::{infer_parameters, notebook_help, NotebookHelp};
use crate::parameterize::{
    apply_report_mode, parameterize_document, warn_unknown_parameters, ParameterizeOptions,
    INJECTED_PARAMETERS_TAG, PARAMETERS_TAG,
};
use crate::template::{
    add_builtin_parameters, render_optional_path, render_path, PathParameters, TemplateValue,
    BUILTIN_GROUP,
};
use indexmap::IndexSet;
use nbforge_document::{is_document_text, Document, ParamValue, Parameters};
use nbforge_extract::{CellExtractor, ExtractError, ExtractedUnit, PythonProbe, UnitSignature};
use nbforge_io::{StorageRouter, StorageTarget, STREAM_MARKER};
use nbforge_translate::{Parameter, PythonTranslator, Translator, TranslatorRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parameter carrying the resolved input path when injection is requested
pub const INPUT_PATH_PARAMETER: &str = "NBFORGE_INPUT_PATH";

/// Parameter carrying the resolved output path when injection is requested
pub const OUTPUT_PATH_PARAMETER: &str = "NBFORGE_OUTPUT_PATH";

/// File name of the persisted document when the input has no basename
pub const DEFAULT_DOCUMENT_NAME: &str = "document.ipynb";

/// Where a run's document comes from
#[derive(Debug, Clone, PartialEq)]
pub enum RunInput {
    /// Path or URL, possibly templated
    Path(String),
    /// Document already in memory
    Document(Box<Document>),
}

/// Everything a run needs
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    /// Input document
    pub input: RunInput,
    /// Output directory, possibly templated; `None` saves nothing
    pub output: Option<String>,
    /// Tags to extract into units
    pub tags: Vec<String>,
    /// Parameters to inject
    pub parameters: Parameters,
    /// Engine name; the configured default when `None`
    pub engine: Option<String>,
    /// Kernel name override
    pub kernel_name: Option<String>,
    /// Language override
    pub language: Option<String>,
    /// Hide code cell sources
    pub report_mode: bool,
    /// Working directory for execution
    pub cwd: Option<PathBuf>,
    /// Inject the resolved input path as a parameter
    pub inject_input_path: bool,
    /// Inject the resolved output path as a parameter
    pub inject_output_path: bool,
}

impl RunRequest {
    fn with_input(input: RunInput) -> Self {
        Self {
            input,
            output: None,
            tags: Vec::new(),
            parameters: Parameters::new(),
            engine: None,
            kernel_name: None,
            language: None,
            report_mode: false,
            cwd: None,
            inject_input_path: false,
            inject_output_path: false,
        }
    }

    /// Run the document at `path`
    #[must_use]
    pub fn from_path(path: impl Into<String>) -> Self {
        Self::with_input(RunInput::Path(path.into()))
    }

    /// Run an in-memory document
    #[must_use]
    pub fn from_document(doc: Document) -> Self {
        Self::with_input(RunInput::Document(Box::new(doc)))
    }

    /// With output directory
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// With tags to extract
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// With parameters
    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// With engine
    #[must_use]
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    /// With kernel name override
    #[must_use]
    pub fn with_kernel_name(mut self, kernel_name: impl Into<String>) -> Self {
        self.kernel_name = Some(kernel_name.into());
        self
    }

    /// With language override
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// With report mode
    #[inline]
    #[must_use]
    pub fn with_report_mode(mut self, report_mode: bool) -> Self {
        self.report_mode = report_mode;
        self
    }

    /// With execution working directory
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// With input/output path injection
    #[inline]
    #[must_use]
    pub fn with_inject_paths(mut self, input: bool, output: bool) -> Self {
        self.inject_input_path = input;
        self.inject_output_path = output;
        self
    }
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Identifier of the run and name of its artifact directory
    pub run_id: String,
    /// Executed document
    pub document: Document,
    /// Extracted units
    pub units: Vec<ExtractedUnit>,
    /// Paths written, document first
    pub artifacts: Vec<String>,
    /// Units skipped because they do not parse
    pub skipped_units: Vec<ExtractError>,
}

/// Runs documents end to end
#[derive(Debug)]
pub struct Orchestrator {
    config: NbforgeConfig,
    storage: StorageRouter,
    translators: TranslatorRegistry,
    engines: EngineRegistry,
    extractor: CellExtractor,
}

impl Orchestrator {
    /// Create an orchestrator with the default registries
    ///
    /// # Errors
    ///
    /// Returns `NbforgeError::Io` if a storage handler cannot be built.
    pub fn new(config: NbforgeConfig) -> Result<Self, NbforgeError> {
        let storage = StorageRouter::with_defaults(&config.storage)?;
        let extractor = CellExtractor::new()
            .with_indent(config.unit_indent.clone())
            .with_availability(Arc::new(PythonProbe::new(config.python.clone())))
            .with_project_dir(config.resolved_project_dir())
            .with_max_depth(config.max_resolve_depth);
        Ok(Self {
            engines: EngineRegistry::with_defaults(&config.jupyter),
            translators: TranslatorRegistry::with_defaults(),
            storage,
            extractor,
            config,
        })
    }

    /// Replace the storage router
    #[must_use]
    pub fn with_storage(mut self, storage: StorageRouter) -> Self {
        self.storage = storage;
        self
    }

    /// Replace the translator registry
    #[must_use]
    pub fn with_translators(mut self, translators: TranslatorRegistry) -> Self {
        self.translators = translators;
        self
    }

    /// Replace the engine registry
    #[must_use]
    pub fn with_engines(mut self, engines: EngineRegistry) -> Self {
        self.engines = engines;
        self
    }

    /// Replace the cell extractor
    #[must_use]
    pub fn with_extractor(mut self, extractor: CellExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &NbforgeConfig {
        &self.config
    }

    /// Storage router
    #[inline]
    #[must_use]
    pub fn storage(&self) -> &StorageRouter {
        &self.storage
    }

    /// Translator registry
    #[inline]
    #[must_use]
    pub fn translators(&self) -> &TranslatorRegistry {
        &self.translators
    }

    /// Engine registry
    #[inline]
    #[must_use]
    pub fn engines(&self) -> &EngineRegistry {
        &self.engines
    }

    /// Describe the parameters of the document at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be loaded or inspected.
    pub fn notebook_help(&self, path: &str) -> Result<NotebookHelp, NbforgeError> {
        let doc = self.storage.load_document(path)?;
        notebook_help(&doc, &self.storage.pretty_path(path), &self.translators)
    }

    /// Run `request`
    ///
    /// # Errors
    ///
    /// Returns `NbforgeError::Execution` after persisting the annotated
    /// document when a cell fails, `NbforgeError::RuntimeDied` when the
    /// runtime dies, and the underlying error for anything else.
    pub fn run(&self, request: RunRequest) -> Result<RunOutcome, NbforgeError> {
        let path_values = add_builtin_parameters(&request.parameters);
        let run_id = builtin_run_id(&path_values);

        let input_path = match &request.input {
            RunInput::Path(template) => Some(render_path(template, &path_values)?),
            RunInput::Document(_) => None,
        };
        let output_path = render_optional_path(request.output.as_deref(), &path_values)?;

        let input_target = match (&request.input, input_path.as_deref()) {
            (RunInput::Document(doc), _) => StorageTarget::Document(doc.as_ref()),
            (RunInput::Path(_), path) => StorageTarget::from(path),
        };
        tracing::info!("Input Notebook:  {}", self.storage.pretty_path(input_target));
        tracing::info!(
            "Output Path: {}",
            self.storage.pretty_path(output_path.as_deref())
        );

        let _cwd = self.storage.local_cwd(None);
        if let Some(cwd) = &request.cwd {
            tracing::info!("Working directory: {}", cwd.display());
        }

        let doc = self.storage.load_document(input_target)?;
        let kernel_name = doc.kernel_name(request.kernel_name.as_deref())?;
        let language = doc.language(request.language.as_deref())?;
        if !request.tags.is_empty() && !language.eq_ignore_ascii_case("python") {
            return Err(ExtractError::UnsupportedLanguage(language).into());
        }

        let parameters = injected_parameters(&request, input_path.as_deref(), output_path.as_deref());
        let declared = infer_parameters(&doc, &self.translators, Some(&kernel_name), Some(&language))?;

        let mut doc = if parameters.is_empty() {
            doc
        } else {
            warn_unknown_parameters(&parameters, &declared);
            let options = ParameterizeOptions::new()
                .with_kernel_name(Some(kernel_name.clone()))
                .with_language(Some(language.clone()))
                .with_report_mode(request.report_mode);
            parameterize_document(doc, &parameters, &declared, &self.translators, &options)?
        };

        if request.report_mode {
            apply_report_mode(&mut doc);
        }
        let run = &mut doc.metadata.nbforge;
        run.version = crate::VERSION.to_string();
        run.input_path.clone_from(&input_path);
        run.output_path.clone_from(&output_path);
        run.run_id = Some(run_id.clone());

        let stripped = strip_error_markers(&mut doc);
        if stripped > 0 {
            tracing::debug!(stripped, "removed error markers from a previous run");
        }

        let engine_name = request
            .engine
            .as_deref()
            .unwrap_or(&self.config.default_engine);
        let engine = self.engines.get(engine_name)?;
        let context = ExecutionContext {
            kernel_name,
            language: language.clone(),
            cwd: request.cwd.clone(),
        };
        tracing::debug!(engine = engine_name, "executing document");
        let mut doc = engine.execute(doc, &context)?;

        let layout = OutputLayout::new(output_path.as_deref(), &run_id, document_name(&request.input, input_path.as_deref()));

        if let Some(error) = find_execution_error(&doc) {
            mark_execution_error(&mut doc, &error);
            self.persist_document(&doc, &layout)?;
            return Err(error.into());
        }

        let signature = unit_signature(&doc, &declared, &parameters);
        let extraction = self
            .extractor
            .extract(&doc, &language, &request.tags, &signature)?;

        let mut artifacts = Vec::new();
        artifacts.extend(self.persist_document(&doc, &layout)?);
        artifacts.extend(self.persist_units(&extraction.units, &layout)?);
        if !extraction.units.is_empty() && layout.directory().is_some() {
            tracing::info!("Generated Python artifacts with UUID directory {run_id}");
        }

        Ok(RunOutcome {
            run_id,
            document: doc,
            units: extraction.units,
            artifacts,
            skipped_units: extraction.skipped,
        })
    }

    fn persist_document(&self, doc: &Document, layout: &OutputLayout) -> Result<Option<String>, NbforgeError> {
        match layout {
            OutputLayout::Discard => Ok(None),
            OutputLayout::Stream => {
                self.storage.write_document(doc, STREAM_MARKER)?;
                Ok(None)
            }
            OutputLayout::Directory { .. } => {
                let target = layout.join(&layout.document_name());
                self.storage.write_document(doc, target.as_str())?;
                Ok(Some(target))
            }
        }
    }

    fn persist_units(&self, units: &[ExtractedUnit], layout: &OutputLayout) -> Result<Vec<String>, NbforgeError> {
        match layout {
            OutputLayout::Discard => return Ok(Vec::new()),
            OutputLayout::Stream => {
                if !units.is_empty() {
                    tracing::warn!(
                        units = units.len(),
                        "output is a stream, extracted units are not saved"
                    );
                }
                return Ok(Vec::new());
            }
            OutputLayout::Directory { .. } => {}
        }

        let mut written = IndexSet::new();
        for unit in units {
            let target = layout.join(&unit.file_name);
            self.storage.write_with(&unit.source, target.as_str(), None)?;
            written.insert(target);

            for file in &unit.bundled {
                let Some(name) = file.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                    continue;
                };
                let target = layout.join(&name);
                if written.contains(&target) {
                    tracing::debug!(file = %file.display(), "bundled file already written");
                    continue;
                }
                let source = self.storage.read_with(path_str(file).as_str(), None)?;
                self.storage.write_with(&source, target.as_str(), None)?;
                written.insert(target);
            }
        }
        Ok(written.into_iter().collect())
    }
}

enum OutputLayout {
    Discard,
    Stream,
    Directory { root: String, document: String },
}

impl OutputLayout {
    fn new(output: Option<&str>, run_id: &str, document: String) -> Self {
        match output {
            None | Some("") => Self::Discard,
            Some(STREAM_MARKER) => Self::Stream,
            Some(dir) => Self::Directory {
                root: format!("{}/{run_id}", dir.trim_end_matches('/')),
                document,
            },
        }
    }

    fn directory(&self) -> Option<&str> {
        match self {
            Self::Directory { root, .. } => Some(root),
            _ => None,
        }
    }

    fn document_name(&self) -> String {
        match self {
            Self::Directory { document, .. } => document.clone(),
            _ => DEFAULT_DOCUMENT_NAME.to_string(),
        }
    }

    fn join(&self, name: &str) -> String {
        format!("{}/{name}", self.directory().unwrap_or_default())
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn builtin_run_id(values: &PathParameters) -> String {
    let from_builtins = match values.get(BUILTIN_GROUP) {
        Some(TemplateValue::Group(group)) => match group.get("run_uuid") {
            Some(TemplateValue::Param(ParamValue::Str(id))) => Some(id.clone()),
            _ => None,
        },
        _ => None,
    };
    from_builtins.unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Basename the executed document is saved under
fn document_name(input: &RunInput, rendered: Option<&str>) -> String {
    let RunInput::Path(_) = input else {
        return DEFAULT_DOCUMENT_NAME.to_string();
    };
    rendered
        .filter(|path| *path != STREAM_MARKER && !is_document_text(path))
        .and_then(|path| path.split('?').next())
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .map_or_else(|| DEFAULT_DOCUMENT_NAME.to_string(), str::to_string)
}

/// Caller parameters over the optional path parameters
fn injected_parameters(request: &RunRequest, input: Option<&str>, output: Option<&str>) -> Parameters {
    let mut parameters = Parameters::new();
    if request.inject_input_path {
        let value = input.map_or(ParamValue::Null, |p| ParamValue::Str(p.to_string()));
        parameters.insert(INPUT_PATH_PARAMETER.to_string(), value);
    }
    if request.inject_output_path {
        let value = output.map_or(ParamValue::Null, |p| ParamValue::Str(p.to_string()));
        parameters.insert(OUTPUT_PATH_PARAMETER.to_string(), value);
    }
    for (name, value) in &request.parameters {
        parameters.insert(name.clone(), value.clone());
    }
    parameters
}

/// Wrapper parameters of extracted units: declared defaults, overridden by
/// injected values, then injected names the document does not declare
///
/// Defaults reading other names are bound by the parameter cells, which
/// then precede the wrapper.
fn unit_signature(doc: &Document, declared: &[Parameter], parameters: &Parameters) -> UnitSignature {
    let python = PythonTranslator;
    let mut defaults: Vec<(String, String)> = declared
        .iter()
        .map(|p| {
            let default = parameters
                .get(&p.name)
                .map_or_else(|| p.default.clone(), |v| python.translate(v));
            (p.name.clone(), default)
        })
        .collect();
    for (name, value) in parameters {
        if !declared.iter().any(|p| &p.name == name) {
            defaults.push((name.clone(), python.translate(value)));
        }
    }

    let prelude = doc
        .cells
        .iter()
        .filter(|cell| cell.is_code() && (cell.has_tag(PARAMETERS_TAG) || cell.has_tag(INJECTED_PARAMETERS_TAG)))
        .map(|cell| cell.source.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    UnitSignature::resolve(defaults, &prelude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbforge_document::Cell;

    #[test]
    fn document_names() {
        let path = RunInput::Path(String::new());
        assert_eq!(document_name(&path, Some("s3://bucket/dir/in.ipynb?x=1")), "in.ipynb");
        assert_eq!(document_name(&path, Some("local/in.ipynb")), "in.ipynb");
        assert_eq!(document_name(&path, Some("-")), DEFAULT_DOCUMENT_NAME);
        assert_eq!(document_name(&path, Some("dir/")), DEFAULT_DOCUMENT_NAME);
        let doc = RunInput::Document(Box::new(Document::new(vec![])));
        assert_eq!(document_name(&doc, None), DEFAULT_DOCUMENT_NAME);
    }

    #[test]
    fn injected_paths_have_lowest_precedence() {
        let mut caller = Parameters::new();
        caller.insert(OUTPUT_PATH_PARAMETER.into(), ParamValue::Str("mine".into()));
        let request = RunRequest::from_path("in.ipynb")
            .with_parameters(caller)
            .with_inject_paths(true, true);
        let merged = injected_parameters(&request, Some("in.ipynb"), Some("out"));
        assert_eq!(merged[INPUT_PATH_PARAMETER], ParamValue::Str("in.ipynb".into()));
        assert_eq!(merged[OUTPUT_PATH_PARAMETER], ParamValue::Str("mine".into()));
    }

    #[test]
    fn signature_prefers_injected_values() {
        let declared = vec![
            Parameter::new("a", None, "1", ""),
            Parameter::new("b", None, "'x'", ""),
        ];
        let mut values = Parameters::new();
        values.insert("b".into(), ParamValue::Str("y".into()));
        values.insert("c".into(), ParamValue::Bool(true));
        let doc = Document::new(vec![Cell::code("a = 1\nb = 'x'").with_tag(PARAMETERS_TAG)]);
        assert_eq!(
            unit_signature(&doc, &declared, &values),
            UnitSignature::new()
                .with_parameter("a", "1")
                .with_parameter("b", "\"y\"")
                .with_parameter("c", "True")
        );
    }

    #[test]
    fn dependent_defaults_keep_notebook_order() {
        let declared = vec![
            Parameter::new("base", None, "'data'", ""),
            Parameter::new("out_dir", None, "base + '/out'", ""),
        ];
        let values = Parameters::from_iter([("base".to_string(), ParamValue::Str("x".into()))]);
        let doc = Document::new(vec![
            Cell::code("base = 'data'\nout_dir = base + '/out'\n").with_tag(PARAMETERS_TAG),
            Cell::code("# Parameters\nbase = \"x\"\n").with_tag(INJECTED_PARAMETERS_TAG),
            Cell::code("print(out_dir)").with_tag("etl"),
        ]);

        let signature = unit_signature(&doc, &declared, &values);
        assert_eq!(
            signature.prelude.as_deref(),
            Some("base = 'data'\nout_dir = base + '/out'\n# Parameters\nbase = \"x\"")
        );
        assert_eq!(
            signature.parameters,
            vec![("base".to_string(), "\"x\"".to_string()), ("out_dir".to_string(), "out_dir".to_string())]
        );
    }

    #[test]
    fn layout_paths() {
        let layout = OutputLayout::new(Some("out/"), "run-1", "in.ipynb".into());
        assert_eq!(layout.join(&layout.document_name()), "out/run-1/in.ipynb");
        assert!(matches!(OutputLayout::new(Some("-"), "r", String::new()), OutputLayout::Stream));
        assert!(matches!(OutputLayout::new(None, "r", String::new()), OutputLayout::Discard));
    }

    #[test]
    fn run_id_comes_from_builtins() {
        let values = add_builtin_parameters(&Parameters::new());
        let id = builtin_run_id(&values);
        let expected = match &values[BUILTIN_GROUP] {
            TemplateValue::Group(group) => group["run_uuid"].clone(),
            _ => unreachable!(),
        };
        assert_eq!(TemplateValue::Param(ParamValue::Str(id)), expected);
    }
}
