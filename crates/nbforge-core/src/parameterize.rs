//! Parameter injection
//!
//! Renders the caller's parameters as a code cell in the document's own
//! language and places it after the `parameters` cell.

use crate::error::NbforgeError;
use nbforge_document::{Cell, Document, ParamValue, Parameters};
use nbforge_translate::{Parameter, TranslatorRegistry, DEFAULT_PARAMETERS_COMMENT};

/// Tag of the cell declaring parameter defaults
pub const PARAMETERS_TAG: &str = "parameters";

/// Tag of the cell holding injected parameter values
pub const INJECTED_PARAMETERS_TAG: &str = "injected-parameters";

/// How parameters are injected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterizeOptions {
    /// Kernel name overriding the document's kernelspec
    pub kernel_name: Option<String>,
    /// Language overriding the document's metadata
    pub language: Option<String>,
    /// Hide the injected cell's source
    pub report_mode: bool,
    /// Header comment of the injected block
    pub comment: String,
}

impl Default for ParameterizeOptions {
    fn default() -> Self {
        Self {
            kernel_name: None,
            language: None,
            report_mode: false,
            comment: DEFAULT_PARAMETERS_COMMENT.to_string(),
        }
    }
}

impl ParameterizeOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With kernel name
    #[inline]
    #[must_use]
    pub fn with_kernel_name(mut self, kernel_name: Option<String>) -> Self {
        self.kernel_name = kernel_name;
        self
    }

    /// With language
    #[inline]
    #[must_use]
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// With report mode
    #[inline]
    #[must_use]
    pub fn with_report_mode(mut self, report_mode: bool) -> Self {
        self.report_mode = report_mode;
        self
    }
}

/// Log a warning for every supplied name the document does not declare
///
/// Returns the unknown names in supplied order.
pub fn warn_unknown_parameters<'p>(parameters: &'p Parameters, declared: &[Parameter]) -> Vec<&'p str> {
    let unknown: Vec<&str> = parameters
        .keys()
        .map(String::as_str)
        .filter(|name| !declared.iter().any(|p| p.name == *name))
        .collect();
    for name in &unknown {
        tracing::warn!("Passed unknown parameter: {name}");
    }
    unknown
}

/// Inject `parameters` into `doc`
///
/// An existing `injected-parameters` cell is replaced in place. Otherwise
/// the new cell goes right after the first `parameters` cell, or first in
/// the document when there is none. The effective parameters and the
/// declared defaults are recorded in the document metadata.
///
/// # Errors
///
/// Returns `NbforgeError::Metadata` when kernel or language cannot be
/// determined and `NbforgeError::Translate` when no translator matches.
pub fn parameterize_document(
    mut doc: Document,
    parameters: &Parameters,
    declared: &[Parameter],
    translators: &TranslatorRegistry,
    options: &ParameterizeOptions,
) -> Result<Document, NbforgeError> {
    let kernel_name = doc.kernel_name(options.kernel_name.as_deref())?;
    let language = doc.language(options.language.as_deref())?;
    let content = translators.translate_parameters(&kernel_name, &language, parameters, &options.comment)?;

    let mut cell = Cell::code(content).with_tag(INJECTED_PARAMETERS_TAG);
    if options.report_mode {
        cell.hide_source();
    }

    if let Some(index) = doc.find_first_tagged_cell_index(INJECTED_PARAMETERS_TAG) {
        doc.cells[index] = cell;
    } else if let Some(index) = doc.find_first_tagged_cell_index(PARAMETERS_TAG) {
        doc.cells.insert(index + 1, cell);
    } else {
        tracing::warn!("Input notebook does not contain a cell with tag '{PARAMETERS_TAG}'");
        doc.cells.insert(0, cell);
    }

    let run = &mut doc.metadata.nbforge;
    run.parameters = parameters.clone();
    run.default_parameters = declared
        .iter()
        .map(|p| (p.name.clone(), ParamValue::Str(p.default.clone())))
        .collect();
    Ok(doc)
}

/// Hide the source of every code cell
pub fn apply_report_mode(doc: &mut Document) {
    doc.cells
        .iter_mut()
        .filter(|cell| cell.is_code())
        .for_each(Cell::hide_source);
}
