//! Parameter inference and notebook help

use crate::error::NbforgeError;
use crate::parameterize::PARAMETERS_TAG;
use nbforge_document::Document;
use nbforge_translate::{Parameter, TranslateError, TranslatorRegistry};

/// Parameters declared by the document's `parameters` cell
///
/// A document without a `parameters` cell declares nothing. Translators
/// that cannot inspect cells are reported with a warning.
///
/// # Errors
///
/// Returns `NbforgeError::Metadata` when kernel or language cannot be
/// determined and `NbforgeError::Translate` when no translator matches.
pub fn infer_parameters(
    doc: &Document,
    translators: &TranslatorRegistry,
    kernel_name: Option<&str>,
    language: Option<&str>,
) -> Result<Vec<Parameter>, NbforgeError> {
    let Some(index) = doc.find_first_tagged_cell_index(PARAMETERS_TAG) else {
        return Ok(Vec::new());
    };
    let kernel_name = doc.kernel_name(kernel_name)?;
    let language = doc.language(language)?;
    let translator = translators.find_translator(&kernel_name, &language)?;

    match translator.inspect(&doc.cells[index]) {
        Ok(params) => Ok(params),
        Err(TranslateError::InspectionUnsupported(_)) => {
            tracing::warn!(
                "Translator for '{}' language does not support parameter introspection.",
                language
            );
            Ok(Vec::new())
        }
        Err(err) => Err(err.into()),
    }
}

/// Help listing for a document's parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookHelp {
    /// Rendered text
    pub text: String,
    /// Exit status for the help command
    pub exit_code: i32,
}

/// Render `name: type (default X)` lines with aligned help text
#[must_use]
pub fn render_parameter_help(params: &[Parameter]) -> String {
    let mut out = String::new();
    for param in params {
        let type_repr = param.inferred_type.as_deref().unwrap_or("Unknown type");
        let definition = format!("  {}: {} (default {})", param.name, type_repr, param.default);
        let line = if definition.chars().count() > 30 {
            if param.help.is_empty() {
                definition
            } else {
                format!("{definition}\n{}{}", " ".repeat(34), param.help)
            }
        } else {
            format!("{definition:<34}{}", param.help)
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Describe the parameters a document accepts
///
/// # Errors
///
/// See [`infer_parameters`].
pub fn notebook_help(
    doc: &Document,
    pretty_path: &str,
    translators: &TranslatorRegistry,
) -> Result<NotebookHelp, NbforgeError> {
    let mut text = format!("\nParameters inferred for notebook '{pretty_path}':\n");
    if !doc.any_tagged_cell(PARAMETERS_TAG) {
        text.push_str("\n  No cell tagged 'parameters'\n");
        return Ok(NotebookHelp { text, exit_code: 1 });
    }

    let params = infer_parameters(doc, translators, None, None)?;
    if params.is_empty() {
        text.push_str(
            "\n  Can't infer anything about this notebook's parameters. It may not have any parameter defined.\n",
        );
    } else {
        text.push_str(&render_parameter_help(&params));
    }
    Ok(NotebookHelp { text, exit_code: 0 })
}
