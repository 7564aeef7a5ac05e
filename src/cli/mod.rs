//! CLI layer for the `wsf` binary.
//!
//! Provides the command-line interface using clap, with commands for
//! resolving connection strings, initializing backends, and reporting
//! schema status.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
