//! nbforge parameter translators
//!
//! Renders structured parameter values as source literals for the language a
//! document's kernel runs, and recovers declared parameters from a document's
//! `parameters` cell.
//!
//! # Example
//!
//! ```rust
//! use nbforge_document::{ParamValue, Parameters};
//! use nbforge_translate::TranslatorRegistry;
//!
//! let registry = TranslatorRegistry::with_defaults();
//! let mut params = Parameters::new();
//! params.insert("alpha".into(), ParamValue::Float(f64::NAN));
//!
//! let block = registry
//!     .translate_parameters("python3", "python", &params, "Parameters")
//!     .unwrap();
//! assert_eq!(block, "# Parameters\nalpha = float('nan')\n");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod inspect;
pub mod languages;
pub mod registry;
pub mod translator;

pub use error::TranslateError;
pub use inspect::{inspect_python, Parameter};
pub use languages::{BashTranslator, JuliaTranslator, PythonTranslator, RTranslator, ScalaTranslator};
pub use registry::TranslatorRegistry;
pub use translator::{escape_double_quoted, Translator, DEFAULT_PARAMETERS_COMMENT};
