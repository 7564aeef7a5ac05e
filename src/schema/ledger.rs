//! Version ledger.
//!
//! A single-column table holding one row per applied schema version. It is
//! an existence/count record, not migration metadata: a freshly created
//! database at version `N` holds the rows `1..=N`.

use crate::backend::SqlExecutor;
use crate::error::{Result, SchemaError};

/// Name of the ledger table.
pub const VERSION_LEDGER_TABLE: &str = "VersionInfo";

/// DDL for the ledger table.
pub const CREATE_LEDGER_SQL: &str = "CREATE TABLE VersionInfo (Version bigint not null)";

/// SQL recording one version.
pub const INSERT_VERSION_SQL: &str = "INSERT INTO VersionInfo (Version) VALUES (?1)";

/// SQL reading the highest recorded version.
pub const HIGHEST_VERSION_SQL: &str = "SELECT MAX(Version) FROM VersionInfo";

/// SQL counting recorded versions.
pub const COUNT_VERSIONS_SQL: &str = "SELECT COUNT(*) FROM VersionInfo";

/// Ledger operations over any [`SqlExecutor`].
pub struct VersionLedger<'a> {
    sql: &'a dyn SqlExecutor,
}

impl<'a> VersionLedger<'a> {
    /// Wraps an executor.
    #[must_use]
    pub fn new(sql: &'a dyn SqlExecutor) -> Self {
        Self { sql }
    }

    /// Creates the ledger table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table already exists or cannot be created.
    pub fn create_table(&self) -> Result<()> {
        self.sql
            .execute_batch(CREATE_LEDGER_SQL)
            .map_err(|e| SchemaError::Ledger(e.to_string()).into())
    }

    /// Creates the ledger table unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or the table created.
    pub fn ensure_table(&self) -> Result<()> {
        if self.exists()? {
            Ok(())
        } else {
            self.create_table()
        }
    }

    /// Checks whether the ledger table exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub fn exists(&self) -> Result<bool> {
        self.sql.table_exists(VERSION_LEDGER_TABLE)
    }

    /// Inserts one row per version from 1 to `version`.
    ///
    /// The rows are written in one transaction, or in the caller's when one
    /// is already open.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be written; none are kept then.
    pub fn populate(&self, version: u64) -> Result<()> {
        let last = to_row(version)?;
        self.insert(&mut (1..=last))
    }

    /// Records a single applied version.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    pub fn record(&self, version: u64) -> Result<()> {
        let row = to_row(version)?;
        self.insert(&mut std::iter::once(row))
    }

    fn insert(&self, versions: &mut dyn Iterator<Item = i64>) -> Result<()> {
        self.sql
            .execute_each(INSERT_VERSION_SQL, versions)
            .map_err(|e| SchemaError::Ledger(e.to_string()).into())
    }

    /// Highest recorded version; 0 when the ledger is empty or missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn highest(&self) -> Result<u64> {
        if !self.exists()? {
            tracing::warn!("version ledger missing; reporting version 0");
            return Ok(0);
        }
        let value = self
            .sql
            .query_i64(HIGHEST_VERSION_SQL)
            .map_err(|e| SchemaError::Ledger(e.to_string()))?;
        to_version(value.unwrap_or(0))
    }

    /// Number of recorded versions; 0 when the ledger is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn count(&self) -> Result<u64> {
        if !self.exists()? {
            return Ok(0);
        }
        let value = self
            .sql
            .query_i64(COUNT_VERSIONS_SQL)
            .map_err(|e| SchemaError::Ledger(e.to_string()))?;
        to_version(value.unwrap_or(0))
    }
}

fn to_row(version: u64) -> Result<i64> {
    i64::try_from(version)
        .map_err(|_| SchemaError::Ledger(format!("version {version} is out of range")).into())
}

fn to_version(value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| SchemaError::Ledger(format!("negative version {value} in ledger")).into())
}
