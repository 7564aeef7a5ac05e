//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use crate::backend::{BackendProvider, StandardBackends};
use crate::cli::output::{
    OutputFormat, Resolution, StatusReport, format_activation, format_resolution, format_status,
};
use crate::cli::parser::{Cli, Commands};
use crate::connection::ConnectionDescriptor;
use crate::error::Result;
use crate::factory::WorkspaceFactory;
use crate::schema::{SchemaModel, SchemaState, VersionLedger, probe};
use crate::settings::Settings;

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let settings = cli.settings()?;

    match &cli.command {
        Commands::Resolve { raw } => Ok(cmd_resolve(&settings, raw.as_deref(), format)),
        Commands::Init => cmd_init(settings, format),
        Commands::Status => cmd_status(&settings, format),
    }
}

// ==================== Command Implementations ====================

fn cmd_resolve(settings: &Settings, raw: Option<&str>, format: OutputFormat) -> String {
    let raw = raw.unwrap_or(&settings.connection_string);
    let descriptor = ConnectionDescriptor::resolve(raw);
    let resolution = Resolution {
        flavor: descriptor.flavor(),
        flat_file: settings.flat_file_path(&descriptor),
        descriptor,
    };
    format_resolution(&resolution, format)
}

fn cmd_init(settings: Settings, format: OutputFormat) -> Result<String> {
    let factory = WorkspaceFactory::new(settings, Box::new(StandardBackends::new()));
    let activation = factory.initialize()?;
    Ok(format_activation(&activation, format))
}

fn cmd_status(settings: &Settings, format: OutputFormat) -> Result<String> {
    let descriptor = ConnectionDescriptor::resolve(&settings.connection_string);
    let marker_path = settings.migration_marker_path();

    let mut status = StatusReport {
        database: None,
        state: None,
        ledger_version: None,
        expected_version: settings.db_version,
        marker_present: marker_path.exists(),
        marker_path,
        flat_file: settings.flat_file_path(&descriptor),
        descriptor,
    };

    if status.descriptor.kind.is_relational() {
        let engine = StandardBackends::new().relational(&status.descriptor, settings)?;
        let state = probe(engine.as_ref(), &SchemaModel::standard())?;
        if state != SchemaState::NotExists {
            status.ledger_version = Some(VersionLedger::new(engine.as_ref()).highest()?);
        }
        status.database = Some(engine.connection_target());
        status.state = Some(state);
    }

    Ok(format_status(&status, format))
}
