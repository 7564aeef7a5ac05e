//! Relational backend collaborator interfaces.

use crate::connection::ConnectionDescriptor;
use crate::error::{BackendError, Result};
use crate::schema::SchemaModel;
use crate::workspace::{Access, SharedWorkspace};
use rusqlite::{Connection, OptionalExtension};

/// Minimal SQL surface needed to maintain the version ledger.
pub trait SqlExecutor {
    /// Executes one or more statements.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Runs one statement with a single integer parameter once per value.
    ///
    /// All executions share one transaction: the caller's when one is open,
    /// otherwise a new one committed at the end.
    ///
    /// # Errors
    ///
    /// Returns an error if any execution fails; nothing is written then.
    fn execute_each(&self, sql: &str, values: &mut dyn Iterator<Item = i64>) -> Result<()>;

    /// Runs a query returning a single nullable integer.
    ///
    /// Returns `None` when no row is returned or the value is NULL.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn query_i64(&self, sql: &str) -> Result<Option<i64>>;

    /// Checks whether a table exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be queried.
    fn table_exists(&self, table: &str) -> Result<bool>;
}

impl SqlExecutor for Connection {
    fn execute_batch(&self, sql: &str) -> Result<()> {
        Self::execute_batch(self, sql).map_err(BackendError::from)?;
        Ok(())
    }

    fn execute_each(&self, sql: &str, values: &mut dyn Iterator<Item = i64>) -> Result<()> {
        let tx = if self.is_autocommit() {
            Some(self.unchecked_transaction().map_err(BackendError::from)?)
        } else {
            None
        };

        {
            let mut stmt = self.prepare(sql).map_err(BackendError::from)?;
            for value in values {
                stmt.execute([value]).map_err(BackendError::from)?;
            }
        }

        if let Some(tx) = tx {
            tx.commit().map_err(BackendError::from)?;
        }
        Ok(())
    }

    fn query_i64(&self, sql: &str) -> Result<Option<i64>> {
        let value: Option<Option<i64>> = self
            .query_row(sql, [], |row| row.get(0))
            .optional()
            .map_err(BackendError::from)?;
        Ok(value.flatten())
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .map_err(BackendError::from)?;
        Ok(count > 0)
    }
}

/// A relational database the schema initializer can manage.
///
/// Implementations own the physical database: existence, creation,
/// deletion, the structural comparison against the expected model, and
/// opening workspace handles.
pub trait RelationalEngine: SqlExecutor + Send + Sync {
    /// Descriptor this engine was built from.
    fn descriptor(&self) -> &ConnectionDescriptor;

    /// Live connection target handed to migration engines.
    fn connection_target(&self) -> String;

    /// Checks whether the physical database exists.
    ///
    /// # Errors
    ///
    /// Returns an error if existence cannot be determined.
    fn exists(&self) -> Result<bool>;

    /// Compares the live schema with the expected model.
    ///
    /// # Errors
    ///
    /// Returns an error if the live schema cannot be inspected.
    fn compatible_with_model(&self, model: &SchemaModel) -> Result<bool>;

    /// Creates the physical database with the model's tables and a version
    /// ledger holding the rows `1..=version`.
    ///
    /// Creation is all or nothing: when it fails, no database is left behind
    /// for the next probe to find.
    ///
    /// # Errors
    ///
    /// Returns an error if the database already exists or creation fails.
    fn create(&self, model: &SchemaModel, version: u64) -> Result<()>;

    /// Deletes the physical database.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn delete(&self) -> Result<()>;

    /// Opens a fresh workspace handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened.
    fn open(&self, access: Access) -> Result<SharedWorkspace>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_executor() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!SqlExecutor::table_exists(&conn, "t").unwrap());

        SqlExecutor::execute_batch(&conn, "CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (7);")
            .unwrap();
        assert!(SqlExecutor::table_exists(&conn, "t").unwrap());
        assert_eq!(conn.query_i64("SELECT MAX(v) FROM t").unwrap(), Some(7));
    }

    #[test]
    fn test_execute_each_is_all_or_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        SqlExecutor::execute_batch(&conn, "CREATE TABLE t (v INTEGER CHECK (v < 3));").unwrap();

        conn.execute_each("INSERT INTO t (v) VALUES (?1)", &mut (1_i64..=2))
            .unwrap();
        assert_eq!(conn.query_i64("SELECT COUNT(*) FROM t").unwrap(), Some(2));

        assert!(
            conn.execute_each("INSERT INTO t (v) VALUES (?1)", &mut [0_i64, 5].into_iter())
                .is_err()
        );
        assert_eq!(conn.query_i64("SELECT COUNT(*) FROM t").unwrap(), Some(2));
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_execute_each_joins_open_transaction() {
        let mut conn = Connection::open_in_memory().unwrap();
        SqlExecutor::execute_batch(&conn, "CREATE TABLE t (v INTEGER);").unwrap();

        let tx = conn.transaction().unwrap();
        tx.execute_each("INSERT INTO t (v) VALUES (?1)", &mut (1_i64..=3))
            .unwrap();
        drop(tx);

        assert_eq!(conn.query_i64("SELECT COUNT(*) FROM t").unwrap(), Some(0));
    }

    #[test]
    fn test_query_null_and_empty() {
        let conn = Connection::open_in_memory().unwrap();
        SqlExecutor::execute_batch(&conn, "CREATE TABLE t (v INTEGER);").unwrap();
        assert_eq!(conn.query_i64("SELECT MAX(v) FROM t").unwrap(), None);
        assert_eq!(conn.query_i64("SELECT v FROM t").unwrap(), None);
    }
}
