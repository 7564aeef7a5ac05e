//! Bundled `SQLite` relational engine.
//!
//! Serves both relational kinds. A file descriptor names the database file
//! directly; a server descriptor names a database (`Database` or `Initial
//! Catalog`) that is hosted as `<data_path>/<name>.db`.

use crate::backend::relational::{RelationalEngine, SqlExecutor};
use crate::connection::{BackendKind, ConnectionDescriptor};
use crate::error::{BackendError, IoError, Result, SchemaError};
use crate::schema::{SchemaModel, VersionLedger};
use crate::workspace::{Access, SharedWorkspace, SqliteWorkspace};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extension of databases hosted for server descriptors.
pub const HOSTED_DATABASE_EXTENSION: &str = "db";

/// `SQLite` implementation of [`RelationalEngine`].
#[derive(Debug, Clone)]
pub struct SqliteEngine {
    descriptor: ConnectionDescriptor,
    path: PathBuf,
}

impl SqliteEngine {
    /// Builds an engine for a relational descriptor.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::InvalidTarget` for non-relational descriptors
    /// and for server descriptors that do not name a database.
    pub fn new(descriptor: &ConnectionDescriptor, data_path: &Path) -> Result<Self> {
        let path = match descriptor.kind {
            BackendKind::RelationalFile => PathBuf::from(&descriptor.raw),
            BackendKind::RelationalServer => {
                let options = descriptor.options();
                let name = options.database().ok_or_else(|| BackendError::InvalidTarget {
                    target: descriptor.raw.clone(),
                    reason: "no Database or Initial Catalog option".to_string(),
                })?;
                if name.contains(['/', '\\']) || name == ".." {
                    return Err(BackendError::InvalidTarget {
                        target: descriptor.raw.clone(),
                        reason: format!("database name '{name}' is not a plain name"),
                    }
                    .into());
                }
                data_path.join(format!("{name}.{HOSTED_DATABASE_EXTENSION}"))
            }
            BackendKind::DocumentStore | BackendKind::FlatFile => {
                return Err(BackendError::InvalidTarget {
                    target: descriptor.raw.clone(),
                    reason: format!("{} is not a relational backend", descriptor.kind),
                }
                .into());
            }
        };

        Ok(Self {
            descriptor: descriptor.clone(),
            path,
        })
    }

    /// Returns the database file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.path, flags).map_err(BackendError::from)?;
        Ok(conn)
    }

    /// Column names and declared types of a table, in declaration order.
    fn table_shape(conn: &Connection, table: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = conn
            .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(BackendError::from)?;
        let rows = stmt
            .query_map([table], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(BackendError::from)?;

        let mut columns = Vec::new();
        for row in rows {
            let (name, decl) = row.map_err(BackendError::from)?;
            columns.push((name.to_lowercase(), decl.to_uppercase()));
        }
        Ok(columns)
    }

    fn sidecar_files(&self) -> Vec<PathBuf> {
        sidecars(&self.path)
    }

    /// Path the database is built at before it is moved into place.
    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".creating");
        PathBuf::from(name)
    }

    /// Writes the model tables and the ledger into a new file at `path` in
    /// one transaction.
    fn build(path: &Path, model: &SchemaModel, version: u64) -> Result<()> {
        let failed = |e: rusqlite::Error| SchemaError::CreateFailed(e.to_string());
        let mut conn = Connection::open(path).map_err(failed)?;
        let tx = conn.transaction().map_err(failed)?;
        tx.execute_batch(&model.create_sql()).map_err(failed)?;

        let ledger = VersionLedger::new(&*tx);
        ledger.create_table()?;
        ledger.populate(version)?;

        tx.commit().map_err(failed)?;
        Ok(())
    }
}

fn sidecars(path: &Path) -> Vec<PathBuf> {
    ["-wal", "-shm", "-journal"]
        .iter()
        .map(|suffix| {
            let mut name = path.as_os_str().to_os_string();
            name.push(suffix);
            PathBuf::from(name)
        })
        .collect()
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

impl SqlExecutor for SqliteEngine {
    fn execute_batch(&self, sql: &str) -> Result<()> {
        SqlExecutor::execute_batch(&self.connect()?, sql)
    }

    fn execute_each(&self, sql: &str, values: &mut dyn Iterator<Item = i64>) -> Result<()> {
        self.connect()?.execute_each(sql, values)
    }

    fn query_i64(&self, sql: &str) -> Result<Option<i64>> {
        self.connect()?.query_i64(sql)
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        SqlExecutor::table_exists(&self.connect()?, table)
    }
}

impl RelationalEngine for SqliteEngine {
    fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    fn connection_target(&self) -> String {
        self.path.display().to_string()
    }

    fn exists(&self) -> Result<bool> {
        Ok(self.path.is_file())
    }

    fn compatible_with_model(&self, model: &SchemaModel) -> Result<bool> {
        // Materialize the model in memory and compare table shapes.
        let expected = Connection::open_in_memory().map_err(BackendError::from)?;
        expected
            .execute_batch(&model.create_sql())
            .map_err(|e| SchemaError::Compatibility(format!("invalid model DDL: {e}")))?;

        let live = self.connect()?;
        for table in model.tables() {
            let want = Self::table_shape(&expected, &table.name)?;
            let have = Self::table_shape(&live, &table.name)?;
            if want != have {
                tracing::debug!(table = %table.name, "live table differs from model");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn create(&self, model: &SchemaModel, version: u64) -> Result<()> {
        if self.exists()? {
            return Err(SchemaError::CreateFailed(format!(
                "database already exists at {}",
                self.path.display()
            ))
            .into());
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        // Build under a staging name; only a complete database is renamed
        // into place.
        let staging = self.staging_path();
        let discard = || {
            for path in std::iter::once(staging.clone()).chain(sidecars(&staging)) {
                if let Err(e) = remove_if_present(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove staging file");
                }
            }
        };
        discard();

        if let Err(e) = Self::build(&staging, model, version) {
            discard();
            return Err(e);
        }
        if let Err(e) = std::fs::rename(&staging, &self.path) {
            discard();
            return Err(SchemaError::CreateFailed(format!("{}: {e}", self.path.display())).into());
        }

        tracing::info!(path = %self.path.display(), version, "created database");
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        for path in std::iter::once(self.path.clone()).chain(self.sidecar_files()) {
            if path.exists() {
                std::fs::remove_file(&path).map_err(|e| {
                    SchemaError::DeleteFailed(format!("{}: {e}", path.display()))
                })?;
            }
        }
        tracing::info!(path = %self.path.display(), "deleted database");
        Ok(())
    }

    fn open(&self, access: Access) -> Result<SharedWorkspace> {
        let workspace = SqliteWorkspace::open(&self.path, access, self.descriptor.kind)?;
        Ok(Arc::new(workspace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> SqliteEngine {
        let raw = dir.path().join("store.sdf");
        let descriptor = ConnectionDescriptor::resolve(&raw.display().to_string());
        SqliteEngine::new(&descriptor, dir.path()).unwrap()
    }

    #[test]
    fn test_file_descriptor_path() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        assert_eq!(engine.path(), dir.path().join("store.sdf"));
        assert_eq!(engine.descriptor().kind, BackendKind::RelationalFile);
    }

    #[test]
    fn test_server_descriptor_hosted_under_data_path() {
        let descriptor = ConnectionDescriptor::resolve("Server=X;Database=Y;");
        let engine = SqliteEngine::new(&descriptor, Path::new("/srv/data")).unwrap();
        assert_eq!(engine.path(), Path::new("/srv/data/Y.db"));
    }

    #[test]
    fn test_server_descriptor_without_database() {
        let descriptor = ConnectionDescriptor::resolve("Server=X;");
        let err = SqliteEngine::new(&descriptor, Path::new("/srv")).unwrap_err();
        assert!(err.to_string().contains("Initial Catalog"));

        let descriptor = ConnectionDescriptor::resolve("Server=X;Database=../etc;");
        assert!(SqliteEngine::new(&descriptor, Path::new("/srv")).is_err());
    }

    #[test]
    fn test_non_relational_descriptor_rejected() {
        let descriptor = ConnectionDescriptor::resolve("mongodb://h/db");
        assert!(SqliteEngine::new(&descriptor, Path::new("/srv")).is_err());
    }

    #[test]
    fn test_create_exists_delete() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let model = SchemaModel::standard();

        assert!(!engine.exists().unwrap());
        engine.create(&model, 3).unwrap();
        assert!(engine.exists().unwrap());
        assert!(engine.table_exists("records").unwrap());
        assert!(engine.compatible_with_model(&model).unwrap());
        assert_eq!(VersionLedger::new(&engine).count().unwrap(), 3);
        assert!(!engine.staging_path().exists());

        assert!(engine.create(&model, 3).is_err());

        engine.delete().unwrap();
        assert!(!engine.exists().unwrap());
    }

    #[test]
    fn test_failed_model_ddl_leaves_no_database() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let broken = SchemaModel::standard().with_table("orders", "CREATE TABLE orders (");

        let err = engine.create(&broken, 2).unwrap_err();
        assert!(matches!(err, crate::Error::Schema(SchemaError::CreateFailed(_))));
        assert!(!engine.exists().unwrap());
        assert!(!engine.staging_path().exists());

        engine.create(&SchemaModel::standard(), 2).unwrap();
        assert_eq!(VersionLedger::new(&engine).highest().unwrap(), 2);
    }

    #[test]
    fn test_failed_ledger_leaves_no_database() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        // Model tables are fine; the ledger rows cannot be written.
        assert!(engine.create(&SchemaModel::standard(), u64::MAX).is_err());
        assert!(!engine.exists().unwrap());
        assert!(
            std::fs::read_dir(dir.path()).unwrap().next().is_none(),
            "no staging or journal files are left behind"
        );
    }

    #[test]
    fn test_stale_staging_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        std::fs::write(engine.staging_path(), "left over from a crash").unwrap();

        engine.create(&SchemaModel::standard(), 1).unwrap();
        assert!(engine.compatible_with_model(&SchemaModel::standard()).unwrap());
        assert!(!engine.staging_path().exists());
    }

    #[test]
    fn test_incompatible_when_model_changes() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.create(&SchemaModel::standard(), 1).unwrap();

        let extended = SchemaModel::standard()
            .with_table("orders", "CREATE TABLE orders (id INTEGER PRIMARY KEY, total REAL)");
        assert!(!engine.compatible_with_model(&extended).unwrap());

        engine
            .execute_batch("CREATE TABLE orders (id INTEGER PRIMARY KEY, total REAL)")
            .unwrap();
        assert!(engine.compatible_with_model(&extended).unwrap());
    }

    #[test]
    fn test_open_handles_are_independent() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.create(&SchemaModel::standard(), 1).unwrap();

        let a = engine.open(Access::ReadWrite).unwrap();
        let b = engine.open(Access::ReadWrite).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));

        a.put("c", "1", serde_json::json!(1)).unwrap();
        assert_eq!(b.count("c").unwrap(), 1);
    }
}
