//! nbforge run orchestration
//!
//! Ties the document model, translators, storage and extraction together
//! into one run:
//!
//! 1. Resolve templated input and output paths ([`template`])
//! 2. Load the document through the [`nbforge_io::StorageRouter`]
//! 3. Inject parameters after the `parameters` cell ([`parameterize`])
//! 4. Record run metadata and strip markers from a previous failure
//! 5. Execute through a named [`Engine`]
//! 6. Mark the first cell error, or extract tagged units
//! 7. Persist the document and units under `<output>/<run_id>/`
//!
//! # Example
//!
//! ```rust,no_run
//! use nbforge_core::{NbforgeConfig, Orchestrator, RunRequest};
//!
//! let orchestrator = Orchestrator::new(NbforgeConfig::new())?;
//! let outcome = orchestrator.run(
//!     RunRequest::from_path("analysis.ipynb")
//!         .with_output("out")
//!         .with_tags(["etl"]),
//! )?;
//! println!("artifacts in out/{}", outcome.run_id);
//! # Ok::<(), nbforge_core::NbforgeError>(())
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod engine;
pub mod error;
pub mod failure;
pub mod inspection;
pub mod orchestrator;
pub mod parameterize;
pub mod template;

pub use config::{NbforgeConfig, LEGACY_PROJECT_DIR_ENV, PROJECT_DIR_ENV};
pub use engine::{Engine, EngineRegistry, ExecutionContext, NbconvertEngine, PassthroughEngine};
pub use error::{NbforgeError, RUNTIME_DIED_EXIT_CODE};
pub use failure::{
    find_execution_error, mark_execution_error, strip_error_markers, ExecutionError,
    ERROR_MARKER_TAG,
};
pub use inspection::{infer_parameters, notebook_help, render_parameter_help, NotebookHelp};
pub use orchestrator::{
    Orchestrator, RunInput, RunOutcome, RunRequest, DEFAULT_DOCUMENT_NAME, INPUT_PATH_PARAMETER,
    OUTPUT_PATH_PARAMETER,
};
pub use parameterize::{
    apply_report_mode, parameterize_document, warn_unknown_parameters, ParameterizeOptions,
    INJECTED_PARAMETERS_TAG, PARAMETERS_TAG,
};
pub use template::{add_builtin_parameters, render_optional_path, render_path, PathParameters, TemplateValue};

/// Version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
