//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::connection::{ConnectionDescriptor, EngineFlavor};
use crate::error::Error;
use crate::factory::Activation;
use crate::migration::MigrationOutcome;
use crate::schema::{InitAction, SchemaState};
use serde::Serialize;
use std::fmt::Write;
use std::path::PathBuf;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Result of resolving a connection string.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// Resolved descriptor.
    pub descriptor: ConnectionDescriptor,
    /// Engine flavor for relational kinds.
    pub flavor: Option<EngineFlavor>,
    /// Flat-file location for the flat-file kind.
    pub flat_file: Option<PathBuf>,
}

/// Backend and schema status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Configured descriptor.
    pub descriptor: ConnectionDescriptor,
    /// Database location for relational kinds.
    pub database: Option<String>,
    /// Schema state for relational kinds.
    pub state: Option<SchemaState>,
    /// Highest ledger version, when the database exists.
    pub ledger_version: Option<u64>,
    /// Expected schema version.
    pub expected_version: u64,
    /// Migration marker location.
    pub marker_path: PathBuf,
    /// Whether migrations are pending.
    pub marker_present: bool,
    /// Flat-file location for the flat-file kind.
    pub flat_file: Option<PathBuf>,
}

/// Formats a resolution.
#[must_use]
pub fn format_resolution(resolution: &Resolution, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_resolution_text(resolution),
        OutputFormat::Json => format_json(resolution),
    }
}

fn format_resolution_text(resolution: &Resolution) -> String {
    let d = &resolution.descriptor;
    let mut output = String::new();
    let _ = writeln!(output, "Kind:        {}", d.kind);
    let _ = writeln!(output, "Raw:         {}", display_or_dash(&d.raw));
    let _ = writeln!(output, "Normalized:  {}", display_or_dash(&d.normalized));
    if let Some(flavor) = resolution.flavor {
        let _ = writeln!(output, "Flavor:      {flavor}");
    }
    if let Some(path) = &resolution.flat_file {
        let _ = writeln!(output, "Flat file:   {}", path.display());
    }
    output
}

/// Formats the outcome of `init`.
#[must_use]
pub fn format_activation(activation: &Activation, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_activation_text(activation),
        OutputFormat::Json => format_json(activation),
    }
}

fn format_activation_text(activation: &Activation) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Backend:     {}", activation.descriptor.kind);
    match &activation.schema {
        Some(report) => {
            let _ = writeln!(output, "Observed:    {}", report.observed);
            let _ = writeln!(output, "Action:      {}", describe_action(&report.action));
            let _ = writeln!(output, "DB version:  {}", report.current_version);
        }
        None => output.push_str("Shared backend primed; no schema to initialize.\n"),
    }
    output
}

fn describe_action(action: &InitAction) -> String {
    match action {
        InitAction::Created => "created".to_string(),
        InitAction::Recreated => "recreated (existing data discarded)".to_string(),
        InitAction::Migrated(MigrationOutcome::Skipped) => {
            "migration skipped (no marker)".to_string()
        }
        InitAction::Migrated(MigrationOutcome::Applied(versions)) if versions.is_empty() => {
            "migrated (no pending steps)".to_string()
        }
        InitAction::Migrated(MigrationOutcome::Applied(versions)) => {
            let list: Vec<String> = versions.iter().map(u64::to_string).collect();
            format!("migrated ({})", list.join(", "))
        }
        InitAction::None => "none".to_string(),
    }
}

/// Formats a status report.
#[must_use]
pub fn format_status(status: &StatusReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_status_text(status),
        OutputFormat::Json => format_json(status),
    }
}

fn format_status_text(status: &StatusReport) -> String {
    let mut output = String::new();
    output.push_str("Workspace Status\n");
    output.push_str("================\n\n");
    let _ = writeln!(output, "  Backend:       {}", status.descriptor.kind);
    if let Some(database) = &status.database {
        let _ = writeln!(output, "  Database:      {database}");
    }
    if let Some(state) = status.state {
        let _ = writeln!(output, "  Schema:        {state}");
    }
    if let Some(version) = status.ledger_version {
        let _ = writeln!(output, "  DB version:    {version}");
    }
    let _ = writeln!(output, "  Expected:      {}", status.expected_version);
    let _ = writeln!(
        output,
        "  Migration:     {}",
        if status.marker_present {
            "pending"
        } else {
            "none"
        }
    );
    if let Some(path) = &status.flat_file {
        let _ = writeln!(output, "  Flat file:     {}", path.display());
    }
    output
}

/// Formats an error.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct ErrorBody {
                error: String,
            }
            format_json(&ErrorBody {
                error: error.to_string(),
            })
        }
    }
}

/// Formats a value as JSON.
fn format_json<T: Serialize>(value: &T) -> String {
    let mut text = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    text.push('\n');
    text
}

fn display_or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}
