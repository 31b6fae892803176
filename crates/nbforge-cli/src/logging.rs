//! Logging bootstrap

use clap::ValueEnum;
use nbforge_io::STREAM_MARKER;
use tracing_subscriber::EnvFilter;

/// `--log-level` values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    /// Everything
    Trace,
    /// Handler resolution, per-unit analysis
    Debug,
    /// Pipeline milestones
    #[default]
    Info,
    /// Recoverable problems
    #[value(alias = "WARNING")]
    Warn,
    /// Failures only
    #[value(alias = "CRITICAL")]
    Error,
}

impl LogLevel {
    /// Filter directive for this level
    #[must_use]
    pub fn directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Level actually used for a run writing to `output_path`
    ///
    /// The default level drops to `Error` when the document goes to stdout.
    #[must_use]
    pub fn for_output(self, output_path: &str) -> Self {
        if self == Self::Info && output_path == STREAM_MARKER {
            Self::Error
        } else {
            self
        }
    }
}

/// Install the stderr subscriber; `RUST_LOG` wins over `level`
pub fn init(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));
    // A subscriber may already be installed, e.g. by an embedding test harness
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
