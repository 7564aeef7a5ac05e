//! Migration execution engine interface.

use crate::connection::EngineFlavor;
use crate::error::Result;
use std::path::PathBuf;

/// Everything an engine needs to run pending steps against one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationContext {
    /// Live connection target of the database being migrated.
    pub connection: String,
    /// Relational engine flavor. Passed through, never interpreted here.
    pub flavor: EngineFlavor,
    /// Location of the step definitions.
    pub steps_location: PathBuf,
}

/// Runs all pending migration steps as a whole.
///
/// Implementations apply steps in ascending version order and either apply
/// the whole pending batch or fail. Step authors are responsible for making
/// steps safe to retry from the beginning.
pub trait MigrationEngine: Send + Sync {
    /// Applies pending steps, returning the versions applied in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the steps cannot be loaded or any step fails.
    fn run(&self, context: &MigrationContext) -> Result<Vec<u64>>;
}
