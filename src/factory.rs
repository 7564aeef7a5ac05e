//! Workspace factory.
//!
//! One [`WorkspaceFactory`] is built at process start and shared by
//! reference. The first call to [`WorkspaceFactory::initialize`],
//! [`WorkspaceFactory::create`] or [`WorkspaceFactory::create_read_only`]
//! runs the one-time activation path: resolve the connection string, prime
//! the shared backend (document store or flat file), or bring the relational
//! database to the ready state. Concurrent first callers block until that
//! single run finishes and then observe its result, including a failure.
//!
//! # Examples
//!
//! ```no_run
//! use workspace_factory::workspace::Workspace;
//! use workspace_factory::{Settings, StandardBackends, WorkspaceFactory};
//!
//! let settings = Settings::load("wsf.toml".as_ref())?;
//! let factory = WorkspaceFactory::new(settings, Box::new(StandardBackends::new()));
//! let workspace = factory.create()?;
//! workspace.put("tickets", "1", serde_json::json!({"total": 12}))?;
//! # Ok::<(), workspace_factory::Error>(())
//! ```

use crate::backend::{BackendProvider, RelationalEngine};
use crate::connection::{BackendKind, ConnectionDescriptor};
use crate::error::{BackendError, Error, Result};
use crate::migration::MigrationRunner;
use crate::schema::{InitReport, SchemaInitializer, SchemaModel};
use crate::settings::Settings;
use crate::workspace::{Access, SharedReadOnlyWorkspace, SharedWorkspace};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Outcome of the one-time activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activation {
    /// Descriptor that was active when the backend was selected.
    pub descriptor: ConnectionDescriptor,
    /// Schema initialization report; present for relational backends only.
    pub schema: Option<InitReport>,
}

struct ActiveBackend {
    activation: Activation,
    document_store: Option<SharedWorkspace>,
    relational: Option<Box<dyn RelationalEngine>>,
}

/// Selects the storage backend and hands out workspace handles.
pub struct WorkspaceFactory {
    settings: Settings,
    model: SchemaModel,
    backends: Box<dyn BackendProvider>,
    active: OnceLock<std::result::Result<ActiveBackend, Arc<Error>>>,
    descriptor: RwLock<ConnectionDescriptor>,
    flat_file: RwLock<Option<SharedWorkspace>>,
    current_db_version: AtomicU64,
}

impl WorkspaceFactory {
    /// Creates a factory using the standard schema model.
    ///
    /// Only resolves the connection string; no backend is touched until the
    /// first initialization.
    #[must_use]
    pub fn new(settings: Settings, backends: Box<dyn BackendProvider>) -> Self {
        let descriptor = ConnectionDescriptor::resolve(&settings.connection_string);
        Self {
            settings,
            model: SchemaModel::standard(),
            backends,
            active: OnceLock::new(),
            descriptor: RwLock::new(descriptor),
            flat_file: RwLock::new(None),
            current_db_version: AtomicU64::new(0),
        }
    }

    /// Replaces the schema model relational databases are checked against.
    #[must_use]
    pub fn with_model(mut self, model: SchemaModel) -> Self {
        self.model = model;
        self
    }

    /// Settings the factory was built with.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Schema model relational databases are checked against.
    #[must_use]
    pub const fn model(&self) -> &SchemaModel {
        &self.model
    }

    /// Runs the one-time activation path if it has not run yet.
    ///
    /// # Errors
    ///
    /// Returns `Error::Initialization` carrying the original failure, both
    /// for the call that failed and for every later call.
    pub fn initialize(&self) -> Result<Activation> {
        Ok(self.active()?.activation.clone())
    }

    /// Returns a read/write handle.
    ///
    /// The shared document store or flat file is returned when one is
    /// active; otherwise a fresh relational handle is opened per call.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization failed or the handle cannot be
    /// opened.
    pub fn create(&self) -> Result<SharedWorkspace> {
        let active = self.active()?;
        if let Some(shared) = self.shared(active) {
            return Ok(shared);
        }
        relational_engine(active)?.open(Access::ReadWrite)
    }

    /// Returns a read-only handle.
    ///
    /// Shared backends are returned as-is; relational handles are opened
    /// without write intent.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization failed or the handle cannot be
    /// opened.
    pub fn create_read_only(&self) -> Result<SharedReadOnlyWorkspace> {
        let active = self.active()?;
        let handle: SharedReadOnlyWorkspace = match self.shared(active) {
            Some(shared) => shared,
            None => relational_engine(active)?.open(Access::ReadOnly)?,
        };
        Ok(handle)
    }

    /// Re-resolves the active connection string.
    ///
    /// A flat-file string re-primes the shared flat-file backend. A document
    /// store or relational database selected by an earlier activation stays
    /// selected.
    ///
    /// # Errors
    ///
    /// Returns an error if the new flat file cannot be opened; the previous
    /// descriptor is kept in that case.
    pub fn set_default_connection_string(&self, raw: &str) -> Result<()> {
        let descriptor = ConnectionDescriptor::resolve(raw);
        if descriptor.kind == BackendKind::FlatFile {
            self.prime_flat_file(&descriptor, true)?;
        } else if let Some(Ok(active)) = self.active.get() {
            tracing::info!(
                kind = %descriptor.kind,
                active = %active.activation.descriptor.kind,
                "connection string changed; active backend selection is kept"
            );
        }

        *self
            .descriptor
            .write()
            .unwrap_or_else(PoisonError::into_inner) = descriptor;
        Ok(())
    }

    /// Database version observed by the last schema initialization.
    ///
    /// Zero until a relational backend has been initialized.
    #[must_use]
    pub fn current_db_version(&self) -> u64 {
        self.current_db_version.load(Ordering::SeqCst)
    }

    /// Descriptor of the most recent resolution.
    #[must_use]
    pub fn active_descriptor(&self) -> ConnectionDescriptor {
        self.descriptor
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn active(&self) -> Result<&ActiveBackend> {
        self.active
            .get_or_init(|| self.activate().map_err(Arc::new))
            .as_ref()
            .map_err(|e| Error::Initialization(Arc::clone(e)))
    }

    fn activate(&self) -> Result<ActiveBackend> {
        self.settings.validate()?;
        let descriptor = self.active_descriptor();
        tracing::info!(kind = %descriptor.kind, "activating workspace backend");

        let mut active = ActiveBackend {
            activation: Activation {
                descriptor: descriptor.clone(),
                schema: None,
            },
            document_store: None,
            relational: None,
        };

        match descriptor.kind {
            BackendKind::DocumentStore => {
                active.document_store = Some(self.backends.document_store(&descriptor)?);
                tracing::info!("document store primed");
            }
            BackendKind::FlatFile => self.prime_flat_file(&descriptor, false)?,
            BackendKind::RelationalFile | BackendKind::RelationalServer => {
                let engine = self.backends.relational(&descriptor, &self.settings)?;
                let runner = MigrationRunner::new(
                    self.backends.migration_engine(),
                    self.settings.migration_marker_path(),
                    self.settings.migration_steps_path(),
                );
                let report = SchemaInitializer::new(engine.as_ref(), &self.model, runner)
                    .expected_version(self.settings.db_version)
                    .allow_destructive_recreate(self.settings.allow_destructive_recreate)
                    .initialize()?;

                self.current_db_version
                    .store(report.current_version, Ordering::SeqCst);
                active.activation.schema = Some(report);
                active.relational = Some(engine);
            }
        }

        Ok(active)
    }

    fn prime_flat_file(&self, descriptor: &ConnectionDescriptor, replace: bool) -> Result<()> {
        let mut slot = self
            .flat_file
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() && !replace {
            return Ok(());
        }

        let path = self.settings.flat_file_path(descriptor).ok_or_else(|| {
            BackendError::InvalidTarget {
                target: descriptor.raw.clone(),
                reason: "not a flat-file connection string".to_string(),
            }
        })?;
        *slot = Some(self.backends.flat_file(&path)?);
        tracing::info!(path = %path.display(), "flat-file workspace primed");
        Ok(())
    }

    fn shared(&self, active: &ActiveBackend) -> Option<SharedWorkspace> {
        if let Some(document_store) = &active.document_store {
            return Some(Arc::clone(document_store));
        }
        self.flat_file
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn relational_engine(active: &ActiveBackend) -> Result<&dyn RelationalEngine> {
    active.relational.as_deref().ok_or_else(|| {
        BackendError::Unavailable {
            kind: active.activation.descriptor.kind.to_string(),
            reason: "no workspace backend is active".to_string(),
        }
        .into()
    })
}
