//! Configuration for backend selection and schema management.
//!
//! Settings are plain data: loaded from a TOML file, overridden from the
//! command line or environment, and handed by value to the factory.

use crate::connection::{BackendKind, ConnectionDescriptor, FLAT_FILE_EXTENSION};
use crate::error::{IoError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stem of the flat-file name used when no file is configured.
pub const DEFAULT_DATA_FILE_STEM: &str = "SambaData";

/// Name of the marker file that signals pending migrations.
pub const MIGRATION_MARKER_FILE: &str = "migrate.txt";

/// Directory under the application path holding migration steps.
pub const MIGRATION_STEPS_DIR: &str = "migrations";

/// Settings consumed by the workspace factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Raw connection string selecting the backend.
    pub connection_string: String,
    /// Root directory for documents; holds the default flat file.
    pub document_path: PathBuf,
    /// Whether the flat-file name carries the current language.
    pub override_language: bool,
    /// Current language tag, e.g. `tr`.
    pub current_language: String,
    /// Root directory for application data; holds the migration marker.
    pub data_path: PathBuf,
    /// Application install directory; holds migration step definitions.
    pub app_path: PathBuf,
    /// Expected schema version.
    pub db_version: u64,
    /// Drop and recreate a database whose schema does not match the model.
    ///
    /// Destroys data. Intended for development databases only.
    pub allow_destructive_recreate: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let document_path = dirs::document_dir().unwrap_or_else(|| PathBuf::from("."));
        let data_path = dirs::data_dir()
            .map_or_else(|| PathBuf::from("."), |dir| dir.join("workspace-factory"));

        Self {
            connection_string: String::new(),
            document_path,
            override_language: false,
            current_language: String::new(),
            data_path,
            app_path: PathBuf::from("."),
            db_version: 1,
            allow_destructive_recreate: false,
        }
    }
}

impl Settings {
    /// Parses settings from TOML text. Missing keys take default values.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the text is not valid TOML or the
    /// resulting settings fail validation.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| IoError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the language override is enabled
    /// without a language tag.
    pub fn validate(&self) -> Result<()> {
        if self.override_language && self.current_language.trim().is_empty() {
            return Err(crate::Error::config(
                "override_language is set but current_language is empty",
            ));
        }
        Ok(())
    }

    /// Returns the flat-file path for a descriptor.
    ///
    /// A descriptor naming a `.txt` file is used as-is; otherwise the file is
    /// `<document_path>/SambaData[_<language>].txt`. Returns `None` for
    /// non-flat-file descriptors.
    #[must_use]
    pub fn flat_file_path(&self, descriptor: &ConnectionDescriptor) -> Option<PathBuf> {
        if descriptor.kind != BackendKind::FlatFile {
            return None;
        }
        if descriptor.raw.ends_with(FLAT_FILE_EXTENSION) {
            return Some(PathBuf::from(&descriptor.raw));
        }

        let mut name = DEFAULT_DATA_FILE_STEM.to_string();
        if self.override_language {
            name.push('_');
            name.push_str(&self.current_language);
        }
        name.push_str(FLAT_FILE_EXTENSION);
        Some(self.document_path.join(name))
    }

    /// Path of the pending-migration marker.
    #[must_use]
    pub fn migration_marker_path(&self) -> PathBuf {
        self.data_path.join(MIGRATION_MARKER_FILE)
    }

    /// Location of the migration step definitions.
    #[must_use]
    pub fn migration_steps_path(&self) -> PathBuf {
        self.app_path.join(MIGRATION_STEPS_DIR)
    }
}
