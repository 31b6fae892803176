//! Command-line arguments

use crate::logging::LogLevel;
use crate::params::ParameterSources;
use clap::{ArgAction, Parser};
use nbforge_io::STREAM_MARKER;
use std::path::PathBuf;

/// Parameterize a document, execute it and extract tagged cells into
/// standalone Python units.
///
/// NOTEBOOK_PATH and OUTPUT_PATH accept `-` for stdin and stdout. With
/// piped input and a single path, that path is the output.
#[derive(Debug, Clone, Parser)]
#[command(name = "nbforge", version)]
pub struct Cli {
    /// Input document path or URL
    pub notebook_path: Option<String>,

    /// Output directory; artifacts go under `<OUTPUT_PATH>/<run id>/`
    pub output_path: Option<String>,

    /// Display the parameters of NOTEBOOK_PATH and exit
    #[arg(long = "help-notebook")]
    pub help_notebook: bool,

    /// Tag of cells to extract into a unit; repeatable
    #[arg(short = 'P', long = "parameter_specified", value_name = "TAG")]
    pub parameter_specified: Vec<String>,

    /// Parameter NAME VALUE, with True/False/None and numbers coerced
    #[arg(
        short = 'p',
        long = "parameters",
        num_args = 2,
        value_names = ["NAME", "VALUE"],
        action = ArgAction::Append
    )]
    pub parameters: Vec<String>,

    /// Parameter NAME VALUE, kept as text
    #[arg(
        short = 'r',
        long = "parameters_raw",
        num_args = 2,
        value_names = ["NAME", "VALUE"],
        action = ArgAction::Append
    )]
    pub parameters_raw: Vec<String>,

    /// YAML file of parameters; repeatable
    #[arg(short = 'f', long = "parameters_file", value_name = "FILE")]
    pub parameters_file: Vec<String>,

    /// YAML string of parameters; repeatable
    #[arg(short = 'y', long = "parameters_yaml", value_name = "YAML")]
    pub parameters_yaml: Vec<String>,

    /// Base64-encoded YAML string of parameters; repeatable
    #[arg(short = 'b', long = "parameters_base64", value_name = "BASE64")]
    pub parameters_base64: Vec<String>,

    /// Inject the input path as the NBFORGE_INPUT_PATH parameter
    #[arg(long = "inject-input-path")]
    pub inject_input_path: bool,

    /// Inject the output path as the NBFORGE_OUTPUT_PATH parameter
    #[arg(long = "inject-output-path")]
    pub inject_output_path: bool,

    /// Inject both input and output paths
    #[arg(long = "inject-paths")]
    pub inject_paths: bool,

    /// Execution engine
    #[arg(long)]
    pub engine: Option<String>,

    /// Kernel name, overriding the document metadata
    #[arg(short = 'k', long)]
    pub kernel: Option<String>,

    /// Language, overriding the document metadata
    #[arg(short = 'l', long)]
    pub language: Option<String>,

    /// Working directory to execute in
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Log level
    #[arg(long = "log-level", value_enum, ignore_case = true, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Hide code cell sources in the output document
    #[arg(long = "report-mode", overrides_with = "no_report_mode")]
    pub report_mode: bool,

    /// Show code cell sources in the output document
    #[arg(long = "no-report-mode")]
    pub no_report_mode: bool,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Project directory searched for missing imports
    #[arg(long = "project-dir", value_name = "DIR")]
    pub project_dir: Option<PathBuf>,
}

impl Cli {
    /// Collected parameter options
    #[must_use]
    pub fn parameter_sources(&self) -> ParameterSources {
        ParameterSources {
            base64: self.parameters_base64.clone(),
            files: self.parameters_file.clone(),
            yaml: self.parameters_yaml.clone(),
            pairs: pairs(&self.parameters),
            raw: pairs(&self.parameters_raw),
        }
    }

    /// Input and output paths, accounting for piped input
    #[must_use]
    pub fn io_paths(&self, input_piped: bool) -> (String, String) {
        resolve_io_paths(
            self.notebook_path.as_deref(),
            self.output_path.as_deref(),
            input_piped,
        )
    }

    /// Whether the input path should be injected
    #[inline]
    #[must_use]
    pub fn injects_input_path(&self) -> bool {
        self.inject_input_path || self.inject_paths
    }

    /// Whether the output path should be injected
    #[inline]
    #[must_use]
    pub fn injects_output_path(&self) -> bool {
        self.inject_output_path || self.inject_paths
    }
}

fn pairs(flat: &[String]) -> Vec<(String, String)> {
    flat.chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

/// With piped input and only one path, that path is the output
#[must_use]
pub fn resolve_io_paths(notebook: Option<&str>, output: Option<&str>, input_piped: bool) -> (String, String) {
    match (notebook, output) {
        (Some(notebook), None) if input_piped => (STREAM_MARKER.to_string(), notebook.to_string()),
        _ => (
            notebook.unwrap_or(STREAM_MARKER).to_string(),
            output.unwrap_or(STREAM_MARKER).to_string(),
        ),
    }
}

/// Whether standard input is a pipe
#[must_use]
pub fn stdin_is_piped() -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        std::fs::metadata("/dev/stdin").is_ok_and(|m| m.file_type().is_fifo())
    }
    #[cfg(not(unix))]
    {
        false
    }
}
