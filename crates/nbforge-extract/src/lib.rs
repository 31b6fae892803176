//! nbforge cell extraction
//!
//! Assembles the code cells sharing a tag into a standalone Python unit,
//! repairs its free names with `None` stand-ins, and bundles project files
//! that satisfy the unit's missing imports.
//!
//! # Example
//!
//! ```rust
//! use nbforge_document::{Cell, Document};
//! use nbforge_extract::{CellExtractor, UnitSignature};
//!
//! let doc = Document::new(vec![Cell::code("total = helper(a)").with_tag("etl")]);
//! let signature = UnitSignature::new().with_parameter("a", "1");
//! let extraction = CellExtractor::new()
//!     .extract(&doc, "python", &["etl".to_string()], &signature)
//!     .unwrap();
//!
//! assert_eq!(
//!     extraction.units[0].source,
//!     "def etl(a=1):\n    helper = None\n    total = helper(a)\n"
//! );
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod availability;
mod builtins;
pub mod error;
pub mod extractor;
pub mod imports;
pub mod repair;
pub mod resolver;
pub mod scope;
pub mod unit;

pub use availability::{ModuleAvailability, PythonProbe, StdlibAvailability};
pub use builtins::is_builtin;
pub use error::ExtractError;
pub use extractor::{CellExtractor, ExtractedUnit, Extraction};
pub use imports::{missing_references, MissingRef};
pub use repair::{repair_unit, RepairedUnit};
pub use resolver::{ImportResolver, DEFAULT_MAX_DEPTH};
pub use scope::{analyze, ImportRecord, ScopeAnalysis};
pub use unit::{build_units, function_name, is_self_contained, ExtractionUnit, UnitSignature, DEFAULT_INDENT};

/// Parse Python source with the bundled grammar
pub(crate) fn parse_python(source: &str) -> Result<Option<tree_sitter::Tree>, ExtractError> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| ExtractError::ParserInit(e.to_string()))?;
    Ok(parser.parse(source, None))
}
