//! Bundled migration engine over a directory of `.sql` step files.
//!
//! Step files are named `<version>_<name>.sql`, for example
//! `0004_add_orders.sql`. Files that do not match are ignored. Every step
//! whose version is above the highest version in the ledger is applied in
//! ascending order inside a single transaction, and each applied version is
//! recorded in the ledger in that same transaction.

use crate::error::{MigrationError, Result};
use crate::migration::engine::{MigrationContext, MigrationEngine};
use crate::schema::VersionLedger;
use regex::Regex;
use rusqlite::{Connection, OpenFlags};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// One step definition loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStep {
    /// Version the step brings the database to.
    pub version: u64,
    /// Name taken from the file name.
    pub name: String,
    /// Source file.
    pub path: PathBuf,
    /// SQL batch.
    pub sql: String,
}

/// Applies `.sql` step files with `rusqlite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlDirectoryMigrator;

impl SqlDirectoryMigrator {
    /// Creates the migrator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads all step files from `dir`, sorted by version.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::StepsUnavailable` if the directory or a step
    /// cannot be read, and `MigrationError::DuplicateVersion` if two files
    /// share a version.
    pub fn load_steps(dir: &Path) -> Result<Vec<MigrationStep>> {
        let unavailable = |reason: String| MigrationError::StepsUnavailable {
            path: dir.display().to_string(),
            reason,
        };

        let pattern = step_pattern()?;
        let entries = std::fs::read_dir(dir).map_err(|e| unavailable(e.to_string()))?;

        let mut steps: BTreeMap<u64, MigrationStep> = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| unavailable(e.to_string()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(caps) = pattern.captures(&file_name) else {
                tracing::debug!(file = %file_name, "ignoring non-step file");
                continue;
            };

            let version: u64 = caps[1]
                .parse()
                .map_err(|_| unavailable(format!("version in '{file_name}' is out of range")))?;
            let sql = std::fs::read_to_string(&path)
                .map_err(|e| unavailable(format!("{file_name}: {e}")))?;

            let step = MigrationStep {
                version,
                name: caps[2].to_string(),
                path,
                sql,
            };
            if steps.insert(version, step).is_some() {
                return Err(MigrationError::DuplicateVersion { version }.into());
            }
        }

        Ok(steps.into_values().collect())
    }

    fn apply(conn: &mut Connection, steps: &[MigrationStep]) -> Result<Vec<u64>> {
        let tx = conn
            .transaction()
            .map_err(|e| MigrationError::Engine(e.to_string()))?;

        let mut applied = Vec::new();
        {
            let ledger = VersionLedger::new(&*tx);
            ledger.ensure_table()?;
            let highest = ledger.highest()?;

            for step in steps.iter().filter(|s| s.version > highest) {
                tracing::info!(migration = %step.name, version = step.version, "applying migration");
                let failed = |reason: String| MigrationError::StepFailed {
                    version: step.version,
                    name: step.name.clone(),
                    reason,
                };
                tx.execute_batch(&step.sql)
                    .map_err(|e| failed(e.to_string()))?;
                ledger
                    .record(step.version)
                    .map_err(|e| failed(e.to_string()))?;
                applied.push(step.version);
            }
        }

        tx.commit()
            .map_err(|e| MigrationError::Engine(format!("commit failed: {e}")))?;
        Ok(applied)
    }
}

impl MigrationEngine for SqlDirectoryMigrator {
    fn run(&self, context: &MigrationContext) -> Result<Vec<u64>> {
        let steps = Self::load_steps(&context.steps_location)?;
        tracing::debug!(
            flavor = %context.flavor,
            available = steps.len(),
            "loaded migration steps"
        );

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let mut conn = Connection::open_with_flags(&context.connection, flags)
            .map_err(|e| MigrationError::Engine(format!("{}: {e}", context.connection)))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| MigrationError::Engine(e.to_string()))?;

        Self::apply(&mut conn, &steps)
    }
}

fn step_pattern() -> Result<&'static Regex> {
    static STEP_FILE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    STEP_FILE
        .get_or_init(|| Regex::new(r"^(\d+)_([A-Za-z0-9_\-]+)\.sql$"))
        .as_ref()
        .map_err(|e| MigrationError::Engine(format!("step pattern: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::EngineFlavor;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("app.db");
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch(
            "CREATE TABLE VersionInfo (Version bigint not null);
             INSERT INTO VersionInfo VALUES (1);
             CREATE TABLE items (id INTEGER PRIMARY KEY);",
        )
        .unwrap();
        let steps = dir.path().join("migrations");
        std::fs::create_dir(&steps).unwrap();
        (dir, db, steps)
    }

    fn context(db: &Path, steps: &Path) -> MigrationContext {
        MigrationContext {
            connection: db.display().to_string(),
            flavor: EngineFlavor::Compact,
            steps_location: steps.to_path_buf(),
        }
    }

    #[test]
    fn test_load_steps_sorted_and_filtered() {
        let (_dir, _db, steps) = setup();
        std::fs::write(steps.join("10_late.sql"), "SELECT 1;").unwrap();
        std::fs::write(steps.join("2_early.sql"), "SELECT 1;").unwrap();
        std::fs::write(steps.join("README.md"), "notes").unwrap();

        let loaded = SqlDirectoryMigrator::load_steps(&steps).unwrap();
        let versions: Vec<u64> = loaded.iter().map(|s| s.version).collect();
        assert_eq!(versions, vec![2, 10]);
        assert_eq!(loaded[0].name, "early");
    }

    #[test]
    fn test_duplicate_versions_rejected() {
        let (_dir, _db, steps) = setup();
        std::fs::write(steps.join("2_a.sql"), "").unwrap();
        std::fs::write(steps.join("002_b.sql"), "").unwrap();

        let err = SqlDirectoryMigrator::load_steps(&steps).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Migration(MigrationError::DuplicateVersion { version: 2 })
        ));
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = SqlDirectoryMigrator::load_steps(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Migration(MigrationError::StepsUnavailable { .. })
        ));
    }

    #[test]
    fn test_applies_pending_steps_only() {
        let (_dir, db, steps) = setup();
        std::fs::write(steps.join("1_init.sql"), "CREATE TABLE never (x);").unwrap();
        std::fs::write(steps.join("2_price.sql"), "ALTER TABLE items ADD COLUMN price REAL;")
            .unwrap();
        std::fs::write(steps.join("3_name.sql"), "ALTER TABLE items ADD COLUMN name TEXT;")
            .unwrap();

        let applied = SqlDirectoryMigrator::new()
            .run(&context(&db, &steps))
            .unwrap();
        assert_eq!(applied, vec![2, 3]);

        let conn = Connection::open(&db).unwrap();
        let ledger = VersionLedger::new(&conn);
        assert_eq!(ledger.highest().unwrap(), 3);
        assert!(!crate::backend::SqlExecutor::table_exists(&conn, "never").unwrap());

        // Nothing left to apply.
        let again = SqlDirectoryMigrator::new()
            .run(&context(&db, &steps))
            .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_failed_step_rolls_back_batch() {
        let (_dir, db, steps) = setup();
        std::fs::write(steps.join("2_ok.sql"), "ALTER TABLE items ADD COLUMN price REAL;")
            .unwrap();
        std::fs::write(steps.join("3_bad.sql"), "ALTER TABLE missing ADD COLUMN x;").unwrap();

        let err = SqlDirectoryMigrator::new()
            .run(&context(&db, &steps))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Migration(MigrationError::StepFailed { version: 3, .. })
        ));

        let conn = Connection::open(&db).unwrap();
        assert_eq!(VersionLedger::new(&conn).highest().unwrap(), 1);
        let columns: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('items') WHERE name = 'price'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(columns, 0);
    }
}
