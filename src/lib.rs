//! # workspace-factory
//!
//! Storage backend selection and relational schema lifecycle.
//!
//! A single connection string decides, once per process, which backend the
//! application persists to: a flat text file, a document store, or a
//! relational database. Shared backends are constructed once and handed to
//! every caller; relational databases are brought to a ready state (created,
//! recreated, or migrated) before the first handle is returned.
//!
//! ## Features
//!
//! - **Resolution**: typed [`ConnectionDescriptor`] with idempotent option normalization
//! - **Init once**: [`WorkspaceFactory`] activates exactly once, even under concurrent first use
//! - **Schema lifecycle**: existence and compatibility probing with a version ledger
//! - **Migrations**: marker-gated runs through a pluggable [`MigrationEngine`]

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod backend;
pub mod cli;
pub mod connection;
pub mod error;
pub mod factory;
pub mod migration;
pub mod schema;
pub mod settings;
pub mod workspace;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export resolution types
pub use connection::{BackendKind, ConnectionDescriptor, EngineFlavor, normalize_server_connection};

// Re-export factory and configuration
pub use factory::{Activation, WorkspaceFactory};
pub use settings::Settings;

// Re-export backend types
pub use backend::{BackendProvider, RelationalEngine, SqlExecutor, SqliteEngine, StandardBackends};

// Re-export schema and migration types
pub use migration::{
    MigrationContext, MigrationEngine, MigrationOutcome, MigrationRunner, SqlDirectoryMigrator,
};
pub use schema::{InitAction, InitReport, SchemaInitializer, SchemaModel, SchemaState, VersionLedger};

// Re-export workspace handles
pub use workspace::{
    Access, MemoryWorkspace, ReadOnlyWorkspace, SharedReadOnlyWorkspace, SharedWorkspace,
    SqliteWorkspace, TextFileWorkspace, Workspace,
};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
