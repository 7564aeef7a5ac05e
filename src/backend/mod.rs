//! Backend constructors.
//!
//! The factory never constructs a backend directly. It asks a
//! [`BackendProvider`], so applications can plug in a document-store
//! driver, a different relational engine, or a different migration engine.

pub mod relational;
pub mod sqlite;

pub use relational::{RelationalEngine, SqlExecutor};
pub use sqlite::SqliteEngine;

use crate::connection::ConnectionDescriptor;
use crate::error::{BackendError, Result};
use crate::migration::{MigrationEngine, SqlDirectoryMigrator};
use crate::settings::Settings;
use crate::workspace::{SharedWorkspace, TextFileWorkspace};
use std::path::Path;
use std::sync::Arc;

/// Constructors for every backend kind.
pub trait BackendProvider: Send + Sync {
    /// Opens the flat-file backend stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded.
    fn flat_file(&self, path: &Path) -> Result<SharedWorkspace>;

    /// Connects to the document store named by the descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    fn document_store(&self, descriptor: &ConnectionDescriptor) -> Result<SharedWorkspace>;

    /// Builds the relational engine for a relational descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor cannot be mapped onto a database.
    fn relational(
        &self,
        descriptor: &ConnectionDescriptor,
        settings: &Settings,
    ) -> Result<Box<dyn RelationalEngine>>;

    /// Engine that executes pending migration steps.
    fn migration_engine(&self) -> &dyn MigrationEngine;
}

/// Bundled backends: text-file flat files, `SQLite` relational databases,
/// and `.sql` step directories for migrations.
///
/// No document-store driver ships with this crate; selecting the document
/// store with this provider fails with [`BackendError::Unavailable`].
#[derive(Debug, Default)]
pub struct StandardBackends {
    migrator: SqlDirectoryMigrator,
}

impl StandardBackends {
    /// Creates the bundled provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackendProvider for StandardBackends {
    fn flat_file(&self, path: &Path) -> Result<SharedWorkspace> {
        Ok(Arc::new(TextFileWorkspace::open(path, true)?))
    }

    fn document_store(&self, descriptor: &ConnectionDescriptor) -> Result<SharedWorkspace> {
        Err(BackendError::Unavailable {
            kind: descriptor.kind.to_string(),
            reason: "no document-store driver is registered".to_string(),
        }
        .into())
    }

    fn relational(
        &self,
        descriptor: &ConnectionDescriptor,
        settings: &Settings,
    ) -> Result<Box<dyn RelationalEngine>> {
        Ok(Box::new(SqliteEngine::new(descriptor, &settings.data_path)?))
    }

    fn migration_engine(&self) -> &dyn MigrationEngine {
        &self.migrator
    }
}
