//! Connection descriptor resolution.
//!
//! Turns the raw connection string from configuration into a typed
//! [`ConnectionDescriptor`]. The descriptor is produced once and matched
//! exhaustively everywhere else; nothing downstream sniffs the raw string.

pub mod normalize;
pub mod options;

pub use normalize::normalize_server_connection;
pub use options::ConnectionOptions;

use serde::Serialize;
use std::fmt;

/// Extension that selects the flat-file backend.
pub const FLAT_FILE_EXTENSION: &str = ".txt";

/// Extension that selects the compact single-file relational backend.
pub const RELATIONAL_FILE_EXTENSION: &str = ".sdf";

/// URI scheme prefix that selects the document-store backend.
pub const DOCUMENT_STORE_SCHEME: &str = "mongodb://";

/// Storage backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Single-file relational database addressed by path.
    RelationalFile,
    /// Relational database addressed by a server connection string.
    RelationalServer,
    /// Shared document-store connection.
    DocumentStore,
    /// Shared in-memory store persisted to a text file.
    FlatFile,
}

impl BackendKind {
    /// Returns true for both relational kinds.
    #[must_use]
    pub const fn is_relational(self) -> bool {
        matches!(self, Self::RelationalFile | Self::RelationalServer)
    }

    /// Returns the kind name used in logs and output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RelationalFile => "relational-file",
            Self::RelationalServer => "relational-server",
            Self::DocumentStore => "document-store",
            Self::FlatFile => "flat-file",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relational engine flavor handed to migration engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineFlavor {
    /// Compact single-file engine.
    Compact,
    /// Full server engine.
    Server,
}

impl EngineFlavor {
    /// Returns the engine identifier understood by migration engines.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "sqlserverce",
            Self::Server => "sqlserver",
        }
    }
}

impl fmt::Display for EngineFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved, typed representation of a raw connection string.
///
/// Immutable once created. `normalized` equals `raw` for every kind except
/// [`BackendKind::RelationalServer`], whose options are completed by
/// [`normalize_server_connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionDescriptor {
    /// Selected backend kind.
    pub kind: BackendKind,
    /// Connection string as configured.
    pub raw: String,
    /// Connection string handed to the backend.
    pub normalized: String,
}

impl ConnectionDescriptor {
    /// Resolves a raw connection string.
    ///
    /// Rules, first match wins:
    ///
    /// 1. empty, or ending in `.txt` → [`BackendKind::FlatFile`]
    /// 2. ending in `.sdf` → [`BackendKind::RelationalFile`]
    /// 3. starting with `mongodb://` → [`BackendKind::DocumentStore`]
    /// 4. anything else → [`BackendKind::RelationalServer`]
    ///
    /// Unrecognized strings are never rejected here; they fall through to the
    /// relational server kind and fail, if at all, when the backend connects.
    ///
    /// # Examples
    ///
    /// ```
    /// use workspace_factory::connection::{BackendKind, ConnectionDescriptor};
    ///
    /// let d = ConnectionDescriptor::resolve("mongodb://localhost/db");
    /// assert_eq!(d.kind, BackendKind::DocumentStore);
    /// ```
    #[must_use]
    pub fn resolve(raw: &str) -> Self {
        let kind = if raw.is_empty() || raw.ends_with(FLAT_FILE_EXTENSION) {
            BackendKind::FlatFile
        } else if raw.ends_with(RELATIONAL_FILE_EXTENSION) {
            BackendKind::RelationalFile
        } else if raw.starts_with(DOCUMENT_STORE_SCHEME) {
            BackendKind::DocumentStore
        } else {
            BackendKind::RelationalServer
        };

        let normalized = match kind {
            BackendKind::RelationalServer => normalize_server_connection(raw),
            BackendKind::RelationalFile | BackendKind::DocumentStore | BackendKind::FlatFile => {
                raw.to_string()
            }
        };

        tracing::debug!(kind = %kind, "resolved connection descriptor");

        Self {
            kind,
            raw: raw.to_string(),
            normalized,
        }
    }

    /// Returns the relational engine flavor, or `None` for non-relational kinds.
    #[must_use]
    pub const fn flavor(&self) -> Option<EngineFlavor> {
        match self.kind {
            BackendKind::RelationalFile => Some(EngineFlavor::Compact),
            BackendKind::RelationalServer => Some(EngineFlavor::Server),
            BackendKind::DocumentStore | BackendKind::FlatFile => None,
        }
    }

    /// Parses the normalized string into options.
    #[must_use]
    pub fn options(&self) -> ConnectionOptions {
        ConnectionOptions::parse(&self.normalized)
    }
}
