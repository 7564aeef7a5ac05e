//! Flat-file workspace.
//!
//! Keeps every record in memory and persists the whole set as JSON to a
//! single text file.

use crate::connection::BackendKind;
use crate::error::{IoError, Result};
use crate::workspace::memory::{self, Collections, MemoryWorkspace};
use crate::workspace::traits::{ReadOnlyWorkspace, Workspace};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Workspace backed by a single text file.
pub struct TextFileWorkspace {
    path: PathBuf,
    autosave: bool,
    records: MemoryWorkspace,
    /// Serializes file writes.
    write_lock: Mutex<()>,
}

impl TextFileWorkspace {
    /// Opens the workspace, loading existing records from `path`.
    ///
    /// A missing or empty file yields an empty workspace; the file is created
    /// on the first save. With `autosave`, every write is persisted
    /// immediately; otherwise only [`Workspace::commit`] writes the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open<P: AsRef<Path>>(path: P, autosave: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = load(&path)?;

        tracing::debug!(path = %path.display(), autosave, "opened flat-file workspace");

        Ok(Self {
            path,
            autosave,
            records: MemoryWorkspace::with_collections(data, BackendKind::FlatFile),
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(memory::poisoned)?;
        self.write_file(&self.records.snapshot()?)
    }

    fn write_file(&self, data: &Collections) -> Result<()> {
        let text = serde_json::to_string_pretty(data)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        // Write-then-rename so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("txt.tmp");
        std::fs::write(&tmp, text).map_err(|e| IoError::WriteFailed {
            path: tmp.display().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| IoError::WriteFailed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Applies a write. With autosave the change is made to a copy, the copy
    /// is saved, and only then does it become visible; a failed save leaves
    /// the records untouched.
    fn apply(&self, change: impl FnOnce(&mut Collections) -> bool) -> Result<bool> {
        if !self.autosave {
            return self.records.modify(change);
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(memory::poisoned)?;
        let mut next = self.records.snapshot()?;
        if !change(&mut next) {
            return Ok(false);
        }
        self.write_file(&next)?;
        self.records.replace(next)?;
        Ok(true)
    }
}

fn load(path: &Path) -> Result<Collections> {
    if !path.exists() {
        return Ok(Collections::new());
    }
    let text = std::fs::read_to_string(path).map_err(|e| IoError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    if text.trim().is_empty() {
        return Ok(Collections::new());
    }
    Ok(serde_json::from_str(&text)?)
}

impl ReadOnlyWorkspace for TextFileWorkspace {
    fn backend(&self) -> BackendKind {
        BackendKind::FlatFile
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        self.records.get(collection, id)
    }

    fn list(&self, collection: &str) -> Result<Vec<Value>> {
        self.records.list(collection)
    }

    fn count(&self, collection: &str) -> Result<usize> {
        self.records.count(collection)
    }
}

impl Workspace for TextFileWorkspace {
    fn put(&self, collection: &str, id: &str, value: Value) -> Result<()> {
        self.apply(|data| {
            memory::insert(data, collection, id, value);
            true
        })?;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        self.apply(|data| memory::remove(data, collection, id))
    }

    fn commit(&self) -> Result<()> {
        self.save()
    }
}
