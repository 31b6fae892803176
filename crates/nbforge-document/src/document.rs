//! Document and document-level metadata

use crate::cell::Cell;
use crate::error::MetadataError;
use crate::format::{CURRENT_MINOR, CURRENT_VERSION};
use crate::value::Parameters;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kernel description under `metadata.kernelspec`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelSpec {
    /// Kernel name, e.g. `python3`
    #[serde(default)]
    pub name: String,
    /// Human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Kernel language
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Fields this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Language description under `metadata.language_info`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageInfo {
    /// Language name, e.g. `python`
    #[serde(default)]
    pub name: String,
    /// Fields this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Run provenance recorded under `metadata.nbforge`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Defaults declared by the `parameters` cell
    #[serde(default)]
    pub default_parameters: Parameters,
    /// Effective parameters injected for this run
    #[serde(default)]
    pub parameters: Parameters,
    /// Environment variables recorded for this run
    #[serde(default)]
    pub environment_variables: IndexMap<String, String>,
    /// Version of the tool that last processed the document
    #[serde(default = "default_version")]
    pub version: String,
    /// Resolved input path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_path: Option<String>,
    /// Resolved output path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Identifier of the run that produced this document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Fields this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_version() -> String {
    crate::VERSION.to_string()
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self {
            default_parameters: Parameters::new(),
            parameters: Parameters::new(),
            environment_variables: IndexMap::new(),
            version: default_version(),
            input_path: None,
            output_path: None,
            run_id: None,
            extra: Map::new(),
        }
    }
}

/// Document-level metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Kernel selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernelspec: Option<KernelSpec>,
    /// Language description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_info: Option<LanguageInfo>,
    /// Run provenance
    #[serde(default)]
    pub nbforge: RunMetadata,
    /// Fields this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A parameterizable computational document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Cells in execution order
    pub cells: Vec<Cell>,
    /// Document metadata
    #[serde(default)]
    pub metadata: DocumentMetadata,
    /// Schema major version
    pub nbformat: u64,
    /// Schema minor version
    pub nbformat_minor: u64,
}

impl Document {
    /// Create a document at the current schema version
    #[must_use]
    pub fn new(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            metadata: DocumentMetadata::default(),
            nbformat: CURRENT_VERSION,
            nbformat_minor: CURRENT_MINOR,
        }
    }

    /// Set the kernelspec and language, returning the document
    #[must_use]
    pub fn with_kernel(mut self, kernel_name: &str, language: &str) -> Self {
        self.metadata.kernelspec = Some(KernelSpec {
            name: kernel_name.to_string(),
            display_name: None,
            language: Some(language.to_string()),
            extra: Map::new(),
        });
        self.metadata.language_info = Some(LanguageInfo {
            name: language.to_string(),
            extra: Map::new(),
        });
        self
    }

    /// Index of the first cell carrying `tag`
    #[must_use]
    pub fn find_first_tagged_cell_index(&self, tag: &str) -> Option<usize> {
        self.cells.iter().position(|cell| cell.has_tag(tag))
    }

    /// Check whether any cell carries `tag`
    #[must_use]
    pub fn any_tagged_cell(&self, tag: &str) -> bool {
        self.cells.iter().any(|cell| cell.has_tag(tag))
    }

    /// Iterate the code cells carrying `tag`, in document order
    pub fn code_cells_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Cell> + 'a {
        self.cells
            .iter()
            .filter(move |cell| cell.is_code() && cell.has_tag(tag))
    }

    /// Resolve the kernel name, preferring `override_name`
    ///
    /// # Errors
    ///
    /// Returns `MetadataError::MissingKernelName` when neither source names one.
    pub fn kernel_name(&self, override_name: Option<&str>) -> Result<String, MetadataError> {
        if let Some(name) = override_name.filter(|n| !n.is_empty()) {
            return Ok(name.to_string());
        }
        self.metadata
            .kernelspec
            .as_ref()
            .map(|spec| spec.name.clone())
            .filter(|name| !name.is_empty())
            .ok_or(MetadataError::MissingKernelName)
    }

    /// Resolve the language, preferring `override_language`
    ///
    /// Falls back to `language_info.name`, then `kernelspec.language`.
    ///
    /// # Errors
    ///
    /// Returns `MetadataError::MissingLanguage` when no source names one.
    pub fn language(&self, override_language: Option<&str>) -> Result<String, MetadataError> {
        if let Some(language) = override_language.filter(|l| !l.is_empty()) {
            return Ok(language.to_string());
        }
        let from_info = self
            .metadata
            .language_info
            .as_ref()
            .map(|info| info.name.clone())
            .filter(|name| !name.is_empty());
        let from_spec = || {
            self.metadata
                .kernelspec
                .as_ref()
                .and_then(|spec| spec.language.clone())
                .filter(|name| !name.is_empty())
        };
        from_info
            .or_else(from_spec)
            .ok_or(MetadataError::MissingLanguage)
    }
}
