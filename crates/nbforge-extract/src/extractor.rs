//! Unit extraction pipeline
//!
//! Build units per tag, repair them, classify what they still miss and
//! bundle the project files that provide it.

use crate::availability::{ModuleAvailability, StdlibAvailability};
use crate::error::ExtractError;
use crate::imports::{missing_references, MissingRef};
use crate::repair::repair_unit;
use crate::resolver::{ImportResolver, DEFAULT_MAX_DEPTH};
use crate::unit::{build_units, UnitSignature, DEFAULT_INDENT};
use nbforge_document::Document;
use std::path::PathBuf;
use std::sync::Arc;

/// A repaired, standalone unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedUnit {
    /// Tag the unit was built for
    pub tag: String,
    /// File name the unit is persisted under
    pub file_name: String,
    /// Repaired source
    pub source: String,
    /// Names that received a `None` stand-in
    pub stand_ins: Vec<String>,
    /// References the target environment does not provide
    pub missing: Vec<MissingRef>,
    /// Project files providing missing references
    pub bundled: Vec<PathBuf>,
}

/// Result of extracting a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Units that repaired cleanly
    pub units: Vec<ExtractedUnit>,
    /// Units skipped because they do not parse
    pub skipped: Vec<ExtractError>,
}

/// Extracts tagged cells into standalone units
pub struct CellExtractor {
    indent: String,
    availability: Arc<dyn ModuleAvailability>,
    project_dir: Option<PathBuf>,
    max_depth: usize,
}

impl Default for CellExtractor {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT.to_string(),
            availability: Arc::new(StdlibAvailability::new()),
            project_dir: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl std::fmt::Debug for CellExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellExtractor")
            .field("indent", &self.indent)
            .field("project_dir", &self.project_dir)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl CellExtractor {
    /// Extractor with four-space indentation, standard-library availability
    /// and no project directory
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indentation for unit bodies
    #[must_use]
    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    /// Predicate deciding which imports are missing
    #[must_use]
    pub fn with_availability(mut self, availability: Arc<dyn ModuleAvailability>) -> Self {
        self.availability = availability;
        self
    }

    /// Directory searched for files that satisfy missing imports
    #[must_use]
    pub fn with_project_dir(mut self, project_dir: Option<PathBuf>) -> Self {
        self.project_dir = project_dir;
        self
    }

    /// Bound on transitive import expansion
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Extract one unit per tag
    ///
    /// `signature` gives the parameters of every unit's wrapper. Units that do not parse are logged and collected in
    /// [`Extraction::skipped`].
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::UnsupportedLanguage` for non-Python documents
    /// and `ExtractError::ParserInit` if the grammar cannot be loaded.
    pub fn extract(
        &self,
        doc: &Document,
        language: &str,
        tags: &[String],
        signature: &UnitSignature,
    ) -> Result<Extraction, ExtractError> {
        if tags.is_empty() {
            return Ok(Extraction::default());
        }
        if !language.eq_ignore_ascii_case("python") {
            return Err(ExtractError::UnsupportedLanguage(language.to_string()));
        }

        let resolver = self.project_dir.as_ref().map(|dir| {
            ImportResolver::new(dir.clone(), Arc::clone(&self.availability))
                .with_max_depth(self.max_depth)
        });

        let mut extraction = Extraction::default();
        for unit in build_units(doc, tags, signature, &self.indent) {
            let repaired = match repair_unit(&unit) {
                Ok(repaired) => repaired,
                Err(err @ ExtractError::Syntax { .. }) => {
                    tracing::error!(tag = %unit.tag, error = %err, "skipping unit");
                    extraction.skipped.push(err);
                    continue;
                }
                Err(err) => return Err(err),
            };

            let missing = missing_references(&repaired.analysis, self.availability.as_ref());
            let bundled = match (&resolver, missing.is_empty()) {
                (_, true) => Vec::new(),
                (Some(resolver), false) => resolver.resolve_refs(&missing)?,
                (None, false) => {
                    tracing::warn!(
                        tag = %unit.tag,
                        missing = missing.len(),
                        "no project directory configured, missing imports stay unresolved"
                    );
                    Vec::new()
                }
            };

            extraction.units.push(ExtractedUnit {
                file_name: unit.file_name(),
                tag: repaired.tag,
                source: repaired.source,
                stand_ins: repaired.stand_ins,
                missing,
                bundled,
            });
        }
        Ok(extraction)
    }
}
