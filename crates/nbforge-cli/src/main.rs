//! `nbforge` entry point

use clap::Parser;
use nbforge_cli::{app, logging, stdin_is_piped, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let input_piped = stdin_is_piped();
    let (_, output) = cli.io_paths(input_piped);
    logging::init(cli.log_level.for_output(&output));

    let code = match app::run(&cli, input_piped) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            if let Some(hint) = app::retry_hint(&err) {
                eprintln!("Hint: {hint}");
            }
            app::exit_code_for(&err)
        }
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
