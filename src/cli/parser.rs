//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use crate::error::Result;
use crate::settings::Settings;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// wsf: storage backend selection and schema lifecycle.
///
/// Resolves connection strings, initializes relational databases and
/// reports their schema state.
#[derive(Parser, Debug)]
#[command(name = "wsf")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a TOML settings file.
    #[arg(short, long, env = "WSF_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Connection string selecting the backend.
    #[arg(long, env = "WSF_CONNECTION", global = true)]
    pub connection: Option<String>,

    /// Application data directory (holds the migration marker).
    #[arg(long, env = "WSF_DATA_PATH", global = true)]
    pub data_path: Option<PathBuf>,

    /// Application directory (holds migration steps).
    #[arg(long, env = "WSF_APP_PATH", global = true)]
    pub app_path: Option<PathBuf>,

    /// Document directory (holds the default flat file).
    #[arg(long, env = "WSF_DOCUMENT_PATH", global = true)]
    pub document_path: Option<PathBuf>,

    /// Expected schema version.
    #[arg(long, env = "WSF_DB_VERSION", global = true)]
    pub db_version: Option<u64>,

    /// Delete and recreate incompatible databases. Destroys data.
    #[arg(long, env = "WSF_ALLOW_DESTRUCTIVE_RECREATE", global = true)]
    pub allow_destructive_recreate: bool,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a connection string without touching any backend.
    Resolve {
        /// Raw connection string. Defaults to the configured one.
        raw: Option<String>,
    },

    /// Run backend activation and schema initialization.
    ///
    /// Creates, recreates or migrates a relational database as needed.
    Init,

    /// Show the backend, schema state, marker and ledger version.
    Status,
}

impl Cli {
    /// Builds settings from the config file and command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the result
    /// fails validation.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        if let Some(connection) = &self.connection {
            settings.connection_string.clone_from(connection);
        }
        if let Some(path) = &self.data_path {
            settings.data_path.clone_from(path);
        }
        if let Some(path) = &self.app_path {
            settings.app_path.clone_from(path);
        }
        if let Some(path) = &self.document_path {
            settings.document_path.clone_from(path);
        }
        if let Some(version) = self.db_version {
            settings.db_version = version;
        }
        if self.allow_destructive_recreate {
            settings.allow_destructive_recreate = true;
        }

        settings.validate()?;
        Ok(settings)
    }
}
