//! Marker-gated migration runner.

use crate::backend::RelationalEngine;
use crate::error::{MigrationError, Result};
use crate::migration::engine::{MigrationContext, MigrationEngine};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Result of a migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "versions", rename_all = "kebab-case")]
pub enum MigrationOutcome {
    /// No marker was present; nothing ran.
    Skipped,
    /// The engine succeeded and the marker was consumed.
    Applied(Vec<u64>),
}

/// Runs the migration engine when the pending-migration marker exists.
///
/// The marker is deleted only after the engine reports success. On failure
/// it stays in place so the next process start retries the same batch.
pub struct MigrationRunner<'a> {
    engine: &'a dyn MigrationEngine,
    marker: PathBuf,
    steps: PathBuf,
}

impl<'a> MigrationRunner<'a> {
    /// Creates a runner.
    #[must_use]
    pub fn new(engine: &'a dyn MigrationEngine, marker: PathBuf, steps: PathBuf) -> Self {
        Self {
            engine,
            marker,
            steps,
        }
    }

    /// Path of the pending-migration marker.
    #[must_use]
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Checks whether migrations are pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.marker.exists()
    }

    /// Migrates `target` if the marker is present.
    ///
    /// # Errors
    ///
    /// Returns the engine's error (marker kept), or
    /// `MigrationError::MarkerRemoval` if the marker cannot be deleted after
    /// a successful run.
    pub fn run(&self, target: &dyn RelationalEngine) -> Result<MigrationOutcome> {
        if !self.is_pending() {
            tracing::debug!(marker = %self.marker.display(), "no migration marker; skipping");
            return Ok(MigrationOutcome::Skipped);
        }

        let descriptor = target.descriptor();
        let flavor = descriptor.flavor().ok_or_else(|| {
            MigrationError::Engine(format!("{} is not a relational backend", descriptor.kind))
        })?;

        let context = MigrationContext {
            connection: target.connection_target(),
            flavor,
            steps_location: self.steps.clone(),
        };

        tracing::info!(
            flavor = %context.flavor,
            steps = %context.steps_location.display(),
            "running migrations"
        );

        let applied = match self.engine.run(&context) {
            Ok(applied) => applied,
            Err(e) => {
                tracing::error!(error = %e, "migration failed; marker kept for retry");
                return Err(e);
            }
        };

        std::fs::remove_file(&self.marker).map_err(|e| MigrationError::MarkerRemoval {
            path: self.marker.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            applied = applied.len(),
            marker = %self.marker.display(),
            "migrations complete; marker removed"
        );
        Ok(MigrationOutcome::Applied(applied))
    }
}
