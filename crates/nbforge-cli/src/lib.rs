//! # nbforge command line
//!
//! Argument parsing, parameter-source loading and logging bootstrap for the
//! `nbforge` binary.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod app;
pub mod args;
pub mod logging;
pub mod params;

pub use app::{build_request, execute, exit_code_for, load_config, retry_hint, run};
pub use args::{resolve_io_paths, stdin_is_piped, Cli};
pub use logging::LogLevel;
pub use params::{resolve_type, ParamSourceError, ParameterSources};
