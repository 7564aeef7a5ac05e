//! Migration runner and engines.
//!
//! The runner only decides *whether* to migrate (the marker file) and
//! consumes the marker afterwards. Executing steps is delegated to a
//! [`MigrationEngine`], so the runner never depends on a particular step
//! format.

pub mod engine;
pub mod runner;
pub mod sql_dir;

pub use engine::{MigrationContext, MigrationEngine};
pub use runner::{MigrationOutcome, MigrationRunner};
pub use sql_dir::{MigrationStep, SqlDirectoryMigrator};
