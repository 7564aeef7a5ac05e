//! Error types for workspace factory operations.
//!
//! This module provides the error hierarchy using `thiserror` for backend
//! construction, schema initialization, migrations, configuration, and file
//! I/O.

use std::sync::Arc;
use thiserror::Error;

/// Result type alias for workspace factory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Backend construction or access errors.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Schema initialization errors.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Migration errors.
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// The one-time initialization failed earlier in this process.
    ///
    /// The original failure is shared by every caller that observes it.
    #[error("workspace initialization failed: {0}")]
    Initialization(#[source] Arc<Self>),
}

/// Errors raised by storage backends.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// No implementation is available for the selected backend kind.
    #[error("no {kind} backend is available: {reason}")]
    Unavailable {
        /// Backend kind that could not be constructed.
        kind: String,
        /// Why construction is not possible.
        reason: String,
    },

    /// The connection target cannot be mapped onto a database.
    #[error("invalid connection target '{target}': {reason}")]
    InvalidTarget {
        /// Offending connection target.
        target: String,
        /// Reason the target is invalid.
        reason: String,
    },

    /// A write was attempted through a read-only handle.
    #[error("workspace is read-only")]
    ReadOnly,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors raised while bringing a relational database to the ready state.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Creating the physical database or its tables failed.
    #[error("failed to create database: {0}")]
    CreateFailed(String),

    /// Deleting an incompatible database failed.
    #[error("failed to delete database: {0}")]
    DeleteFailed(String),

    /// The version ledger could not be written or read.
    #[error("version ledger error: {0}")]
    Ledger(String),

    /// The compatibility check could not be performed.
    #[error("compatibility check failed: {0}")]
    Compatibility(String),
}

/// Errors raised by the migration runner and migration engines.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// A migration step failed; the whole batch was rolled back.
    #[error("migration step {version} ({name}) failed: {reason}")]
    StepFailed {
        /// Version of the failing step.
        version: u64,
        /// Name of the failing step.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// The step definitions could not be read.
    #[error("cannot load migration steps from {path}: {reason}")]
    StepsUnavailable {
        /// Location of the step definitions.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Two step definitions share a version number.
    #[error("duplicate migration version {version}")]
    DuplicateVersion {
        /// The duplicated version.
        version: u64,
    },

    /// The engine could not run against the given target.
    #[error("migration engine failed: {0}")]
    Engine(String),

    /// The migration marker could not be removed after a successful run.
    #[error("failed to remove migration marker {path}: {reason}")]
    MarkerRemoval {
        /// Path to the marker file.
        path: String,
        /// Reason for failure.
        reason: String,
    },
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Directory creation error.
    #[error("failed to create directory: {path}: {reason}")]
    DirectoryFailed {
        /// Path to the directory.
        path: String,
        /// Reason for failure.
        reason: String,
    },
}

impl Error {
    /// Builds a configuration error from any displayable message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// Implement From traits for standard library and dependency errors

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(BackendError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Backend(BackendError::from(err))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}
