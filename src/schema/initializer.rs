//! Schema readiness state machine.
//!
//! ```text
//! Unknown ──probe──▶ NotExists ──create──────────────────────────▶ Ready
//!                  ▶ ExistsCompatible ───────────────────────────▶ Ready
//!                  ▶ ExistsIncompatible ──(destructive)── delete ─▶ NotExists
//!                                       ──(otherwise)─── migrate ▶ Ready
//! ```
//!
//! Once `Ready` is reached the highest ledger version is reported as the
//! current database version.

use crate::backend::RelationalEngine;
use crate::error::Result;
use crate::migration::{MigrationOutcome, MigrationRunner};
use crate::schema::ledger::VersionLedger;
use crate::schema::model::SchemaModel;
use serde::Serialize;
use std::fmt;

/// Readiness states of a relational database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaState {
    /// Not yet probed.
    Unknown,
    /// The physical database does not exist.
    NotExists,
    /// The database exists and matches the expected model.
    ExistsCompatible,
    /// The database exists but differs from the expected model.
    ExistsIncompatible,
    /// The database is usable.
    Ready,
}

impl SchemaState {
    /// Returns the state name used in logs and output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::NotExists => "not-exists",
            Self::ExistsCompatible => "exists-compatible",
            Self::ExistsIncompatible => "exists-incompatible",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for SchemaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What initialization did to reach [`SchemaState::Ready`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "migration", rename_all = "kebab-case")]
pub enum InitAction {
    /// A new database was created.
    Created,
    /// An incompatible database was deleted and created again.
    Recreated,
    /// The migration runner was invoked.
    Migrated(MigrationOutcome),
    /// The database was already compatible.
    None,
}

/// Summary of one initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitReport {
    /// State observed by the first probe.
    pub observed: SchemaState,
    /// Action taken.
    pub action: InitAction,
    /// Highest version in the ledger once ready.
    pub current_version: u64,
}

/// Classifies a relational database against the expected model.
///
/// # Errors
///
/// Returns an error if existence or compatibility cannot be determined.
pub fn probe(engine: &dyn RelationalEngine, model: &SchemaModel) -> Result<SchemaState> {
    if !engine.exists()? {
        Ok(SchemaState::NotExists)
    } else if engine.compatible_with_model(model)? {
        Ok(SchemaState::ExistsCompatible)
    } else {
        Ok(SchemaState::ExistsIncompatible)
    }
}

/// Brings one relational database to [`SchemaState::Ready`].
pub struct SchemaInitializer<'a> {
    engine: &'a dyn RelationalEngine,
    model: &'a SchemaModel,
    runner: MigrationRunner<'a>,
    expected_version: u64,
    allow_destructive_recreate: bool,
}

impl<'a> SchemaInitializer<'a> {
    /// Creates an initializer expecting version 1 with the production policy.
    #[must_use]
    pub fn new(
        engine: &'a dyn RelationalEngine,
        model: &'a SchemaModel,
        runner: MigrationRunner<'a>,
    ) -> Self {
        Self {
            engine,
            model,
            runner,
            expected_version: 1,
            allow_destructive_recreate: false,
        }
    }

    /// Sets the schema version written to the ledger on create.
    #[must_use]
    pub fn expected_version(mut self, version: u64) -> Self {
        self.expected_version = version;
        self
    }

    /// Selects the development policy: incompatible databases are deleted
    /// and recreated instead of migrated. This destroys their data.
    #[must_use]
    pub fn allow_destructive_recreate(mut self, allow: bool) -> Self {
        self.allow_destructive_recreate = allow;
        self
    }

    /// Classifies the database without changing it.
    ///
    /// # Errors
    ///
    /// Returns an error if existence or compatibility cannot be determined.
    pub fn probe(&self) -> Result<SchemaState> {
        probe(self.engine, self.model)
    }

    /// Runs the state machine to [`SchemaState::Ready`].
    ///
    /// # Errors
    ///
    /// Returns the first error of any transition. A failed migration leaves
    /// the marker in place.
    pub fn initialize(&self) -> Result<InitReport> {
        let target = self.engine.connection_target();
        let mut state = SchemaState::Unknown;
        let mut observed = SchemaState::Unknown;
        let mut action = InitAction::None;

        while state != SchemaState::Ready {
            let next = match state {
                SchemaState::Unknown => {
                    observed = self.probe()?;
                    observed
                }
                SchemaState::NotExists => {
                    self.create()?;
                    if !matches!(action, InitAction::Recreated) {
                        action = InitAction::Created;
                    }
                    SchemaState::Ready
                }
                SchemaState::ExistsCompatible | SchemaState::Ready => SchemaState::Ready,
                SchemaState::ExistsIncompatible if self.allow_destructive_recreate => {
                    tracing::warn!(
                        target_db = %target,
                        "schema incompatible; deleting and recreating database, existing data is lost"
                    );
                    self.engine.delete()?;
                    action = InitAction::Recreated;
                    SchemaState::NotExists
                }
                SchemaState::ExistsIncompatible => {
                    action = InitAction::Migrated(self.runner.run(self.engine)?);
                    SchemaState::Ready
                }
            };
            tracing::debug!(from = %state, to = %next, "schema transition");
            state = next;
        }

        let current_version = VersionLedger::new(self.engine).highest()?;
        tracing::info!(
            target_db = %target,
            observed = %observed,
            current_version,
            "schema ready"
        );

        Ok(InitReport {
            observed,
            action,
            current_version,
        })
    }

    fn create(&self) -> Result<()> {
        self.engine.create(self.model, self.expected_version)?;
        tracing::info!(version = self.expected_version, "created schema and version ledger");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SqlExecutor, SqliteEngine};
    use crate::connection::ConnectionDescriptor;
    use crate::migration::SqlDirectoryMigrator;
    use crate::workspace::Access;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const ORDERS_SQL: &str = "CREATE TABLE orders (id INTEGER PRIMARY KEY, total REAL)";

    struct Fixture {
        dir: TempDir,
        engine: SqliteEngine,
        migrator: SqlDirectoryMigrator,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let descriptor = ConnectionDescriptor::resolve("Server=X;Database=Y;");
            let engine = SqliteEngine::new(&descriptor, dir.path()).unwrap();
            Self {
                dir,
                engine,
                migrator: SqlDirectoryMigrator::new(),
            }
        }

        fn marker(&self) -> PathBuf {
            self.dir.path().join("migrate.txt")
        }

        fn steps(&self) -> PathBuf {
            self.dir.path().join("migrations")
        }

        fn runner(&self) -> MigrationRunner<'_> {
            MigrationRunner::new(&self.migrator, self.marker(), self.steps())
        }
    }

    fn ledger_rows(engine: &SqliteEngine) -> Vec<i64> {
        let conn = rusqlite::Connection::open(engine.path()).unwrap();
        let mut stmt = conn
            .prepare("SELECT Version FROM VersionInfo ORDER BY Version")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_fresh_create_populates_ledger() {
        let fx = Fixture::new();
        std::fs::write(fx.marker(), "").unwrap();
        let model = SchemaModel::standard();

        let report = SchemaInitializer::new(&fx.engine, &model, fx.runner())
            .expected_version(3)
            .initialize()
            .unwrap();

        assert_eq!(report.observed, SchemaState::NotExists);
        assert_eq!(report.action, InitAction::Created);
        assert_eq!(report.current_version, 3);
        assert_eq!(ledger_rows(&fx.engine), vec![1, 2, 3]);
        assert!(fx.marker().exists());
    }

    #[test]
    fn test_failed_create_is_retried_on_next_start() {
        let fx = Fixture::new();
        let broken = SchemaModel::standard().with_table("orders", "CREATE TABLE orders (");
        assert!(
            SchemaInitializer::new(&fx.engine, &broken, fx.runner())
                .expected_version(3)
                .initialize()
                .is_err()
        );
        assert_eq!(probe(&fx.engine, &broken).unwrap(), SchemaState::NotExists);

        let model = SchemaModel::standard();
        let report = SchemaInitializer::new(&fx.engine, &model, fx.runner())
            .expected_version(3)
            .initialize()
            .unwrap();
        assert_eq!(report.observed, SchemaState::NotExists);
        assert_eq!(report.action, InitAction::Created);
        assert_eq!(report.current_version, 3);
        assert_eq!(ledger_rows(&fx.engine), vec![1, 2, 3]);
    }

    #[test]
    fn test_created_database_always_carries_its_ledger() {
        let fx = Fixture::new();
        let model = SchemaModel::standard();
        fx.engine.create(&model, 3).unwrap();

        let report = SchemaInitializer::new(&fx.engine, &model, fx.runner())
            .expected_version(3)
            .initialize()
            .unwrap();
        assert_eq!(report.observed, SchemaState::ExistsCompatible);
        assert_eq!(report.current_version, 3);
        assert!(VersionLedger::new(&fx.engine).exists().unwrap());
    }

    #[test]
    fn test_compatible_is_left_alone() {
        let fx = Fixture::new();
        let model = SchemaModel::standard();
        SchemaInitializer::new(&fx.engine, &model, fx.runner())
            .expected_version(2)
            .initialize()
            .unwrap();
        std::fs::write(fx.marker(), "").unwrap();

        let report = SchemaInitializer::new(&fx.engine, &model, fx.runner())
            .expected_version(5)
            .initialize()
            .unwrap();

        assert_eq!(report.observed, SchemaState::ExistsCompatible);
        assert_eq!(report.action, InitAction::None);
        assert_eq!(report.current_version, 2);
        assert!(fx.marker().exists());
    }

    #[test]
    fn test_incompatible_destructive_recreate() {
        let fx = Fixture::new();
        let model = SchemaModel::standard();
        SchemaInitializer::new(&fx.engine, &model, fx.runner())
            .initialize()
            .unwrap();
        let handle = fx.engine.open(Access::ReadWrite).unwrap();
        handle.put("c", "1", serde_json::json!(1)).unwrap();
        drop(handle);

        let extended = SchemaModel::standard().with_table("orders", ORDERS_SQL);
        let report = SchemaInitializer::new(&fx.engine, &extended, fx.runner())
            .expected_version(4)
            .allow_destructive_recreate(true)
            .initialize()
            .unwrap();

        assert_eq!(report.observed, SchemaState::ExistsIncompatible);
        assert_eq!(report.action, InitAction::Recreated);
        assert_eq!(report.current_version, 4);
        assert!(fx.engine.table_exists("orders").unwrap());
        let handle = fx.engine.open(Access::ReadOnly).unwrap();
        assert_eq!(handle.count("c").unwrap(), 0);
    }

    #[test]
    fn test_incompatible_without_marker_skips_migration() {
        let fx = Fixture::new();
        let model = SchemaModel::standard();
        SchemaInitializer::new(&fx.engine, &model, fx.runner())
            .initialize()
            .unwrap();

        let extended = SchemaModel::standard().with_table("orders", ORDERS_SQL);
        let report = SchemaInitializer::new(&fx.engine, &extended, fx.runner())
            .initialize()
            .unwrap();

        assert_eq!(
            report.action,
            InitAction::Migrated(MigrationOutcome::Skipped)
        );
        assert_eq!(report.current_version, 1);
        assert!(!fx.engine.table_exists("orders").unwrap());
    }

    #[test]
    fn test_incompatible_with_marker_migrates() {
        let fx = Fixture::new();
        let model = SchemaModel::standard();
        SchemaInitializer::new(&fx.engine, &model, fx.runner())
            .initialize()
            .unwrap();

        std::fs::create_dir(fx.steps()).unwrap();
        std::fs::write(fx.steps().join("2_orders.sql"), format!("{ORDERS_SQL};")).unwrap();
        std::fs::write(fx.marker(), "").unwrap();

        let extended = SchemaModel::standard().with_table("orders", ORDERS_SQL);
        let report = SchemaInitializer::new(&fx.engine, &extended, fx.runner())
            .initialize()
            .unwrap();

        assert_eq!(
            report.action,
            InitAction::Migrated(MigrationOutcome::Applied(vec![2]))
        );
        assert_eq!(report.current_version, 2);
        assert!(!fx.marker().exists());
        assert_eq!(probe(&fx.engine, &extended).unwrap(), SchemaState::ExistsCompatible);
    }

    #[test]
    fn test_failed_migration_keeps_marker() {
        let fx = Fixture::new();
        let model = SchemaModel::standard();
        SchemaInitializer::new(&fx.engine, &model, fx.runner())
            .initialize()
            .unwrap();

        std::fs::create_dir(fx.steps()).unwrap();
        std::fs::write(fx.steps().join("2_broken.sql"), "ALTER TABLE nope ADD x;").unwrap();
        std::fs::write(fx.marker(), "").unwrap();

        let extended = SchemaModel::standard().with_table("orders", ORDERS_SQL);
        assert!(
            SchemaInitializer::new(&fx.engine, &extended, fx.runner())
                .initialize()
                .is_err()
        );
        assert!(fx.marker().exists());
        assert_eq!(ledger_rows(&fx.engine), vec![1]);
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(SchemaState::ExistsIncompatible.to_string(), "exists-incompatible");
        let json = serde_json::to_value(InitAction::Created).unwrap();
        assert_eq!(json["action"], "created");
    }
}
