//! nbforge document model
//!
//! An in-memory representation of a parameterizable computational document:
//! an ordered sequence of cells plus document-level metadata.
//!
//! # Core Operations
//!
//! - **Load**: Parse raw bytes, upgrade to nbformat 4.5, back-fill metadata containers
//! - **Serialize**: Write the canonical JSON form back out
//!
//! # Invariants
//!
//! - Cell order is execution order. Transformations insert or remove cells at
//!   known positions and never reorder them.
//! - Every cell has a `tags` set after [`load`], so consumers test membership
//!   without checking for absence.
//!
//! # Example
//!
//! ```rust
//! use nbforge_document::{load, serialize, Cell, Document};
//!
//! let mut doc = Document::new(vec![Cell::code("a = 1")]);
//! doc.cells[0].metadata.tags.insert("parameters".to_string());
//!
//! let raw = serialize(&doc).unwrap();
//! let reloaded = load(raw.as_bytes()).unwrap();
//! assert_eq!(reloaded.find_first_tagged_cell_index("parameters"), Some(0));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cell;
pub mod document;
pub mod error;
pub mod format;
mod multiline;
mod upgrade;
pub mod value;

pub use cell::{new_cell_id, Cell, CellKind, CellMetadata, JupyterCellMetadata, Output};
pub use document::{Document, DocumentMetadata, KernelSpec, LanguageInfo, RunMetadata};
pub use error::{FormatError, MetadataError};
pub use format::{from_value, is_document_text, load, serialize, CURRENT_MINOR, CURRENT_VERSION};
pub use value::{ParamValue, Parameters};

/// Version of this crate, recorded in every loaded document's metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
