//! Binary entry point for `wsf`.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use workspace_factory::cli::output::{OutputFormat, format_error};
use workspace_factory::cli::{Cli, execute};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let format = OutputFormat::parse(&cli.format);

    match execute(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                // Handle broken pipe gracefully (e.g., when piped to `head` or `jq`)
                if let Err(e) = write!(io::stdout(), "{output}")
                    && e.kind() != io::ErrorKind::BrokenPipe
                {
                    eprintln!("Error writing to stdout: {e}");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let error_output = format_error(&e, format);
            match format {
                OutputFormat::Json => {
                    // JSON errors go to stdout for programmatic parsing
                    print!("{error_output}");
                }
                OutputFormat::Text => {
                    eprintln!("Error: {error_output}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays parseable. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
