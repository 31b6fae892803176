//! Command dispatch

use crate::args::Cli;
use anyhow::{bail, Context};
use nbforge_core::{NbforgeConfig, NbforgeError, Orchestrator, RunRequest};
use std::io::Write;

/// Configuration named by `--config`, with `--project-dir` applied
///
/// # Errors
///
/// Fails when the configuration file cannot be read or parsed.
pub fn load_config(cli: &Cli) -> anyhow::Result<NbforgeConfig> {
    let config = match &cli.config {
        Some(path) => NbforgeConfig::load(path)?,
        None => NbforgeConfig::new(),
    };
    Ok(match &cli.project_dir {
        Some(dir) => config.with_project_dir(dir.clone()),
        None => config,
    })
}

/// Translate parsed arguments into a run request
///
/// # Errors
///
/// Fails when a parameter source cannot be decoded.
pub fn build_request(cli: &Cli, orchestrator: &Orchestrator, input_piped: bool) -> anyhow::Result<RunRequest> {
    let (input, output) = cli.io_paths(input_piped);
    let parameters = cli
        .parameter_sources()
        .collect(orchestrator.storage())
        .context("failed to load parameters")?;

    let mut request = RunRequest::from_path(input)
        .with_output(output)
        .with_tags(cli.parameter_specified.iter().cloned())
        .with_parameters(parameters)
        .with_report_mode(cli.report_mode)
        .with_inject_paths(cli.injects_input_path(), cli.injects_output_path());
    if let Some(engine) = &cli.engine {
        request = request.with_engine(engine.clone());
    }
    if let Some(kernel) = &cli.kernel {
        request = request.with_kernel_name(kernel.clone());
    }
    if let Some(language) = &cli.language {
        request = request.with_language(language.clone());
    }
    if let Some(cwd) = &cli.cwd {
        request = request.with_cwd(cwd.clone());
    }
    Ok(request)
}

/// Run the command against `orchestrator`; notebook help goes to `stdout`
///
/// Returns the process exit code.
///
/// # Errors
///
/// Propagates parameter, storage and run failures.
pub fn execute(
    cli: &Cli,
    orchestrator: &Orchestrator,
    input_piped: bool,
    stdout: &mut dyn Write,
) -> anyhow::Result<i32> {
    if cli.help_notebook {
        let Some(path) = cli.notebook_path.as_deref() else {
            bail!("--help-notebook requires NOTEBOOK_PATH");
        };
        let help = orchestrator.notebook_help(path)?;
        stdout.write_all(help.text.as_bytes())?;
        stdout.flush()?;
        return Ok(help.exit_code);
    }

    let request = build_request(cli, orchestrator, input_piped)?;
    let outcome = orchestrator.run(request)?;
    tracing::debug!(
        run_id = %outcome.run_id,
        artifacts = outcome.artifacts.len(),
        skipped = outcome.skipped_units.len(),
        "run complete"
    );
    Ok(0)
}

/// Full command: configuration, orchestrator, run
///
/// # Errors
///
/// See [`execute`].
pub fn run(cli: &Cli, input_piped: bool) -> anyhow::Result<i32> {
    let orchestrator = Orchestrator::new(load_config(cli)?)?;
    execute(cli, &orchestrator, input_piped, &mut std::io::stdout().lock())
}

/// Exit code for a failed command
#[must_use]
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<NbforgeError>()
        .map_or(1, NbforgeError::exit_code)
}

/// Advice printed after a failure that may pass on a second attempt
#[must_use]
pub fn retry_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.downcast_ref::<NbforgeError>()
        .filter(|e| e.is_retryable())
        .map(|_| "the execution engine failed to start; rerunning the command may succeed")
}
