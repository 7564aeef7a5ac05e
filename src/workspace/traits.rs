//! Workspace capability traits.
//!
//! A workspace is the handle the application uses to reach the selected
//! backend. Records are JSON values addressed by `(collection, id)`.

use crate::connection::BackendKind;
use crate::error::Result;
use serde_json::Value;
use std::sync::Arc;

/// Read access to a backend.
///
/// Implementations must be safe to share between threads; backends that are
/// cached for the process lifetime are handed to every caller.
pub trait ReadOnlyWorkspace: Send + Sync {
    /// Kind of backend behind this handle.
    fn backend(&self) -> BackendKind;

    /// Retrieves a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Lists every record of a collection, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn list(&self, collection: &str) -> Result<Vec<Value>>;

    /// Returns the number of records in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    fn count(&self, collection: &str) -> Result<usize>;
}

/// Read/write access to a backend.
pub trait Workspace: ReadOnlyWorkspace {
    /// Inserts or replaces a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is read-only or the write fails.
    fn put(&self, collection: &str, id: &str, value: Value) -> Result<()>;

    /// Deletes a record. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is read-only or the delete fails.
    fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    /// Flushes pending changes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails.
    fn commit(&self) -> Result<()>;
}

/// Shared read/write handle.
pub type SharedWorkspace = Arc<dyn Workspace>;

/// Shared read-only handle.
pub type SharedReadOnlyWorkspace = Arc<dyn ReadOnlyWorkspace>;

/// Intent a relational handle is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Reads and writes.
    ReadWrite,
    /// Reads only; the connection is opened without write intent.
    ReadOnly,
}
